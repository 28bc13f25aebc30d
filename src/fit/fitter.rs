//! Meta-d′ fitting for a single count table.
//!
//! Given `(nR_S1, nR_S2)` we:
//! - estimate type-1 `d1` / `t1c1` and starting type-2 criteria
//! - draw a starting meta-d′ in `[0, d1]` from a deterministic seed
//! - minimize the type-2 curve loss under bounds, ordering rows and the
//!   idealization constraint (likelihood-ratio differences `>= beta`)
//! - package the solution in native and RMS units
//!
//! Only malformed input is an error. A fit that does not converge still
//! returns a result with `success == false`.

use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{FitOptions, FitResult, RatingCounts, S1Units, Type2Rates};
use crate::error::DmcError;
use crate::math::{Link, StandardNormal};
use crate::optim::{Problem, SolverReport, SolverStatus, minimize};

use super::constraints::{criterion_rows, parameter_bounds};
use super::guess::{TypeOne, initial_guess, seed_from_beta, seed_meta_d};
use super::model::MetaDModel;

/// Fits meta-d′ with a pluggable link (standard normal by default).
///
/// The fitter holds no per-fit state; one instance can serve any number of
/// fits, including concurrent ones.
#[derive(Debug, Clone)]
pub struct MetaDFitter<L: Link = StandardNormal> {
    link: L,
    options: FitOptions,
}

impl MetaDFitter<StandardNormal> {
    pub fn new(options: FitOptions) -> Self {
        Self {
            link: StandardNormal,
            options,
        }
    }
}

impl Default for MetaDFitter<StandardNormal> {
    fn default() -> Self {
        Self::new(FitOptions::default())
    }
}

impl<L: Link> MetaDFitter<L> {
    pub fn with_link(link: L, options: FitOptions) -> Self {
        Self { link, options }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Fit one count table.
    ///
    /// `beta` is the lower bound of every idealization-constraint difference
    /// and, unless `FitOptions::seed` is set, also the seed of the starting
    /// meta-d′. `p` is recorded in the result only.
    pub fn fit(&self, counts: &RatingCounts, beta: f64, p: f64) -> Result<FitResult, DmcError> {
        let opts = &self.options;
        if !beta.is_finite() {
            return Err(DmcError::invalid_input(format!("beta must be finite, got {beta}.")));
        }
        if !(opts.s.is_finite() && opts.s > 0.0) {
            return Err(DmcError::invalid_input(format!("s must be finite and > 0, got {}.", opts.s)));
        }
        if !(opts.min_criterion_gap > 0.0 && opts.criterion_bound > opts.min_criterion_gap) {
            return Err(DmcError::InvalidConfig(
                "criterion gap must be > 0 and smaller than the criterion bound.".into(),
            ));
        }

        if counts.has_zero_cells() {
            warn!(
                nr_s1 = ?counts.nr_s1,
                nr_s2 = ?counts.nr_s2,
                "count table contains zero cells; meta-d' estimation may be unreliable"
            );
        }

        let n = counts.n_ratings();
        let one = TypeOne::estimate(&self.link, counts, opts.s);
        let model = MetaDModel::new(
            &self.link,
            counts,
            opts.s,
            one.d1,
            one.t1c1,
            opts.constant_criterion,
            beta,
        );

        let seed = opts.seed.unwrap_or_else(|| seed_from_beta(beta));
        let report = if one.is_usable() {
            let meta_d = seed_meta_d(one.d1, seed);
            let x0 = initial_guess(&one, meta_d, opts.constant_criterion, opts.min_criterion_gap, opts.criterion_bound);
            debug!(d1 = one.d1, t1c1 = one.t1c1, x0 = ?x0.as_slice(), "starting meta-d' search");

            let bounds = parameter_bounds(n, one.d1, opts.criterion_bound);
            let rows = criterion_rows(n, opts.min_criterion_gap);
            minimize(&model, x0, &bounds, Some(&rows), &opts.solver)
        } else {
            warn!(d1 = one.d1, t1c1 = one.t1c1, "type-1 sensitivity is not positive; skipping optimization");
            let x = initial_guess(&one, 0.0, opts.constant_criterion, opts.min_criterion_gap, opts.criterion_bound);
            not_run(&model, x, beta)
        };

        let result = self.package(&model, &one, report, beta, p);
        if result.success {
            info!(
                da = result.da,
                meta_da = result.meta_da,
                m_ratio = result.m_ratio,
                iterations = result.iterations,
                "meta-d' fit converged"
            );
        } else {
            warn!(
                status = ?result.status,
                iterations = result.iterations,
                violation = result.constraint_violation,
                "meta-d' fit did not converge; returning best-effort estimate"
            );
        }
        Ok(result)
    }

    /// Fit many tables in parallel; results keep the input order.
    pub fn fit_batch(&self, tables: &[RatingCounts], beta: f64, p: f64) -> Vec<Result<FitResult, DmcError>> {
        tables.par_iter().map(|t| self.fit(t, beta, p)).collect()
    }

    fn package(
        &self,
        model: &MetaDModel<'_, L>,
        one: &TypeOne,
        report: SolverReport,
        beta: f64,
        p: f64,
    ) -> FitResult {
        let s = self.options.s;
        let n = model.n_ratings();
        let x = &report.x;

        let meta_d1 = x[0];
        let meta_c1 = model.offset(meta_d1);
        let t2c1: Vec<f64> = x.iter().skip(1).map(|c| c + meta_c1).collect();
        let (t2c1_rs1, t2c1_rs2) = t2c1.split_at(n - 1);

        let scale = (2.0 / (1.0 + s * s)).sqrt() * s;
        let da = scale * one.d1;
        let meta_da = scale * meta_d1;

        let rates = Type2Rates {
            observed: model.observed().clone(),
            estimated: model.native_rates(x),
        };

        FitResult {
            da,
            s,
            meta_da,
            m_diff: meta_da - da,
            m_ratio: meta_da / da,
            meta_ca: scale * meta_c1,
            t2ca_rs1: t2c1_rs1.iter().map(|c| scale * c).collect(),
            t2ca_rs2: t2c1_rs2.iter().map(|c| scale * c).collect(),
            s1_units: S1Units {
                d1: one.d1,
                meta_d1,
                s,
                meta_c1,
                t2c1_rs1: t2c1_rs1.to_vec(),
                t2c1_rs2: t2c1_rs2.to_vec(),
            },
            loss: report.fun,
            rates,
            success: report.success(),
            status: report.status,
            iterations: report.iterations,
            constraint_violation: report.constraint_violation,
            loss_trace: report.loss_trace,
            beta,
            p,
        }
    }
}

fn not_run<L: Link + ?Sized>(model: &MetaDModel<'_, L>, x: DVector<f64>, beta: f64) -> SolverReport {
    let fun = model.objective(&x);
    let constraint_violation = model
        .constraints(&x)
        .iter()
        .map(|c| if c.is_nan() { f64::INFINITY } else { (beta - c).max(0.0) })
        .fold(0.0, f64::max);
    SolverReport {
        x,
        fun,
        status: SolverStatus::NotRun,
        iterations: 0,
        constraint_violation,
        loss_trace: Vec::new(),
    }
}

/// Fit meta-d′ to raw count vectors with default options.
///
/// Fails with `DmcError::InputShape` for odd or mismatched lengths.
pub fn fit_meta_d_mle(nr_s1: &[f64], nr_s2: &[f64], beta: f64, p: f64) -> Result<FitResult, DmcError> {
    let counts = RatingCounts::new(nr_s1.to_vec(), nr_s2.to_vec())?;
    MetaDFitter::default().fit(&counts, beta, p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::expected_counts;

    fn ideal_counts() -> RatingCounts {
        expected_counts(1.5, &[-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5], 1000.0).unwrap()
    }

    #[test]
    fn shape_errors_are_fatal() {
        assert!(matches!(
            fit_meta_d_mle(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 0.0, 0.0),
            Err(DmcError::InputShape(_))
        ));
        assert!(matches!(
            fit_meta_d_mle(&[1.0; 4], &[1.0; 6], 0.0, 0.0),
            Err(DmcError::InputShape(_))
        ));
    }

    #[test]
    fn ideal_observer_has_m_ratio_near_one() {
        let fit = MetaDFitter::default().fit(&ideal_counts(), 0.0, 0.0).unwrap();
        assert!((fit.da - 1.5).abs() < 1e-6, "da {}", fit.da);
        assert!(fit.m_ratio > 0.9, "m_ratio {} status {:?}", fit.m_ratio, fit.status);
        assert!(fit.m_ratio <= 1.0 + 1e-9);
        assert_eq!(fit.t2ca_rs1.len(), 3);
        assert_eq!(fit.t2ca_rs2.len(), 3);
        assert_eq!(fit.rates.estimated.hr2_rs1.len(), 3);
        assert!(!fit.loss_trace.is_empty());
    }

    #[test]
    fn recovers_generating_criteria_for_four_ratings() {
        let criteria = [-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5];
        for d_prime in [1.5, 1.0] {
            let counts = expected_counts(d_prime, &criteria, 1000.0).unwrap();
            let fit = MetaDFitter::default().fit(&counts, 0.0, 0.0).unwrap();
            assert!(fit.success, "d' {d_prime}: status {:?}", fit.status);
            assert!(fit.loss <= fit.loss_trace[0], "d' {d_prime}: loss {} start {}", fit.loss, fit.loss_trace[0]);

            let units = &fit.s1_units;
            assert!((units.meta_d1 - d_prime).abs() < 1e-2, "d' {d_prime}: meta_d1 {}", units.meta_d1);
            let recovered = units.t2c1_rs1.iter().chain(units.t2c1_rs2.iter());
            let expected = criteria[..3].iter().chain(criteria[4..].iter());
            for (got, want) in recovered.zip(expected) {
                assert!((got - want).abs() < 1e-2, "d' {d_prime}: {units:?}");
            }
        }
    }

    #[test]
    fn same_inputs_give_identical_fits() {
        let fitter = MetaDFitter::default();
        let a = fitter.fit(&ideal_counts(), 0.0, 0.0).unwrap();
        let b = fitter.fit(&ideal_counts(), 0.0, 0.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_positive_d1_skips_the_solver() {
        let counts = RatingCounts::new(vec![10.0; 4], vec![10.0; 4]).unwrap();
        let fit = MetaDFitter::default().fit(&counts, 0.0, 0.0).unwrap();
        assert_eq!(fit.status, SolverStatus::NotRun);
        assert!(!fit.success);
        assert_eq!(fit.iterations, 0);
    }

    #[test]
    fn p_is_carried_through_untouched() {
        let fitter = MetaDFitter::default();
        let a = fitter.fit(&ideal_counts(), 0.0, 0.0).unwrap();
        let b = fitter.fit(&ideal_counts(), 0.0, 0.7).unwrap();
        assert_eq!(b.p, 0.7);
        assert_eq!(a.meta_da, b.meta_da);
    }

    #[test]
    fn rejects_non_finite_beta() {
        let err = MetaDFitter::default().fit(&ideal_counts(), f64::NAN, 0.0);
        assert!(matches!(err, Err(DmcError::InvalidInput(_))));
    }
}
