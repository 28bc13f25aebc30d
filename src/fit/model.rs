//! The meta-d′ model as an optimization problem.
//!
//! Parameter vector, for `n = n_ratings`:
//!
//! ```text
//! x[0]            meta-d′
//! x[1 .. n]       n - 1 criteria below the type-1 criterion (ascending)
//! x[n .. 2n - 1]  n - 1 criteria above the type-1 criterion (ascending)
//! ```
//!
//! Criteria live in the shifted frame: everything is translated by the
//! constant-criterion offset so the type-1 criterion sits at 0. The S1
//! evidence distribution is `N(-m/2 - offset, 1)`, the S2 distribution is
//! `N(m/2 - offset, 1/s)`.

use nalgebra::DVector;

use crate::domain::{ConstantCriterion, RateCurves, RatingCounts};
use crate::math::Link;
use crate::optim::Problem;

/// Additive regularizer for type-2 rate ratios inside the loss.
pub const RATE_EPS: f64 = 1e-9;

/// Loss reported for points where the model cannot be evaluated.
pub const LOSS_SENTINEL: f64 = 1e300;

/// Evidence distributions for one meta-d′ value, in a given frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Evidence {
    pub s1_mean: f64,
    pub s1_sd: f64,
    pub s2_mean: f64,
    pub s2_sd: f64,
}

impl Evidence {
    pub fn new(meta_d: f64, s: f64, shift: f64) -> Self {
        Self {
            s1_mean: -0.5 * meta_d - shift,
            s1_sd: 1.0,
            s2_mean: 0.5 * meta_d - shift,
            s2_sd: 1.0 / s,
        }
    }
}

/// Type-2 rate curves implied by the model.
///
/// `criteria` holds the `2n - 2` type-2 criteria and `t1` the type-1
/// criterion, both in the frame of `ev`. `eps` is added to numerator and
/// denominator of every ratio.
pub(crate) fn model_rates<L: Link + ?Sized>(
    link: &L,
    ev: &Evidence,
    criteria: &[f64],
    t1: f64,
    n_ratings: usize,
    eps: f64,
) -> RateCurves {
    let c_area_rs1 = link.cdf(t1, ev.s1_mean, ev.s1_sd);
    let i_area_rs1 = link.cdf(t1, ev.s2_mean, ev.s2_sd);
    let c_area_rs2 = link.sf(t1, ev.s2_mean, ev.s2_sd);
    let i_area_rs2 = link.sf(t1, ev.s1_mean, ev.s1_sd);

    let mut curves = RateCurves::default();
    for i in 0..n_ratings - 1 {
        let lower = criteria[(n_ratings - 1) - (i + 1)];
        let upper = criteria[(n_ratings - 1) + i];

        let far_rs2 = link.sf(upper, ev.s1_mean, ev.s1_sd);
        let hr_rs2 = link.sf(upper, ev.s2_mean, ev.s2_sd);
        let far_rs1 = link.cdf(lower, ev.s2_mean, ev.s2_sd);
        let hr_rs1 = link.cdf(lower, ev.s1_mean, ev.s1_sd);

        curves.far2_rs2.push((far_rs2 + eps) / (i_area_rs2 + eps));
        curves.hr2_rs2.push((hr_rs2 + eps) / (c_area_rs2 + eps));
        curves.far2_rs1.push((far_rs1 + eps) / (i_area_rs1 + eps));
        curves.hr2_rs1.push((hr_rs1 + eps) / (c_area_rs1 + eps));
    }
    curves
}

/// Observed type-2 rate curves of a count table.
///
/// Point `i` is the share of ratings above `i + 1` among correct (HR2) or
/// incorrect (FAR2) trials of each response side.
pub fn observed_rates(counts: &RatingCounts) -> RateCurves {
    let n = counts.n_ratings();
    let i_rs2: Vec<f64> = counts.nr_s1[n..].to_vec();
    let c_rs2: Vec<f64> = counts.nr_s2[n..].to_vec();
    let i_rs1: Vec<f64> = counts.nr_s2[..n].iter().rev().copied().collect();
    let c_rs1: Vec<f64> = counts.nr_s1[..n].iter().rev().copied().collect();

    let tail_shares = |cells: &[f64]| -> Vec<f64> {
        let total: f64 = cells.iter().sum();
        (0..n - 1)
            .map(|i| cells[i + 1..].iter().sum::<f64>() / total)
            .collect()
    };

    RateCurves {
        hr2_rs1: tail_shares(&c_rs1),
        far2_rs1: tail_shares(&i_rs1),
        hr2_rs2: tail_shares(&c_rs2),
        far2_rs2: tail_shares(&i_rs2),
    }
}

fn mse(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f64>() / a.len() as f64
}

/// Squared-error distance between two sets of rate curves.
pub fn curve_loss(observed: &RateCurves, estimated: &RateCurves) -> f64 {
    mse(&observed.far2_rs1, &estimated.far2_rs1)
        + mse(&observed.far2_rs2, &estimated.far2_rs2)
        + mse(&observed.hr2_rs1, &estimated.hr2_rs1)
        + mse(&observed.hr2_rs2, &estimated.hr2_rs2)
}

/// Objective and idealization constraint for one count table.
pub struct MetaDModel<'a, L: Link + ?Sized> {
    link: &'a L,
    n_ratings: usize,
    s: f64,
    d1: f64,
    t1c1: f64,
    criterion: ConstantCriterion,
    beta: f64,
    observed: RateCurves,
}

impl<'a, L: Link + ?Sized> MetaDModel<'a, L> {
    pub fn new(
        link: &'a L,
        counts: &RatingCounts,
        s: f64,
        d1: f64,
        t1c1: f64,
        criterion: ConstantCriterion,
        beta: f64,
    ) -> Self {
        Self {
            link,
            n_ratings: counts.n_ratings(),
            s,
            d1,
            t1c1,
            criterion,
            beta,
            observed: observed_rates(counts),
        }
    }

    pub fn n_ratings(&self) -> usize {
        self.n_ratings
    }

    pub fn observed(&self) -> &RateCurves {
        &self.observed
    }

    /// Offset between the shifted frame and native units for a meta-d′ value.
    pub fn offset(&self, meta_d: f64) -> f64 {
        self.criterion.offset(meta_d, self.t1c1, self.d1)
    }

    /// Estimated rate curves at `x` in native units, without regularization.
    pub fn native_rates(&self, x: &DVector<f64>) -> RateCurves {
        let meta_d = x[0];
        let cc = self.offset(meta_d);
        let native: Vec<f64> = x.iter().skip(1).map(|c| c + cc).collect();
        let ev = Evidence::new(meta_d, self.s, 0.0);
        model_rates(self.link, &ev, &native, cc, self.n_ratings, 0.0)
    }

    /// Likelihood ratios `P(rating | correct) / P(rating | incorrect)` per
    /// rating bin, or `None` when any criterion pair is out of order or any
    /// bin mass is non-positive or non-finite.
    fn likelihood_ratios(&self, x: &DVector<f64>) -> Option<(Vec<f64>, Vec<f64>)> {
        let n = self.n_ratings;
        let meta_d = x[0];
        let ev = Evidence::new(meta_d, self.s, self.offset(meta_d));

        let mut edges = Vec::with_capacity(2 * n + 1);
        edges.push(f64::NEG_INFINITY);
        edges.extend(x.iter().skip(1).take(n - 1).copied());
        edges.push(0.0);
        edges.extend(x.iter().skip(n).copied());
        edges.push(f64::INFINITY);

        if edges.iter().any(|e| e.is_nan()) || edges.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }

        let link = self.link;
        let below = |lo: f64, hi: f64, mean: f64, sd: f64| link.cdf(hi, mean, sd) - link.cdf(lo, mean, sd);
        let above = |lo: f64, hi: f64, mean: f64, sd: f64| link.sf(lo, mean, sd) - link.sf(hi, mean, sd);

        let mut rs1 = Vec::with_capacity(n);
        let mut rs2 = Vec::with_capacity(n);
        for i in 0..n {
            let (lo, hi) = (edges[i], edges[i + 1]);
            let correct = below(lo, hi, ev.s1_mean, ev.s1_sd);
            let incorrect = below(lo, hi, ev.s2_mean, ev.s2_sd);
            rs1.push(ratio(correct, incorrect)?);

            let (lo, hi) = (edges[n + i], edges[n + i + 1]);
            let correct = above(lo, hi, ev.s2_mean, ev.s2_sd);
            let incorrect = above(lo, hi, ev.s1_mean, ev.s1_sd);
            rs2.push(ratio(correct, incorrect)?);
        }
        Some((rs1, rs2))
    }

    /// Differences between adjacent likelihood ratios, moving away from the
    /// type-1 criterion on each side. Degenerate points give `-inf` everywhere.
    pub fn idealization_diffs(&self, x: &DVector<f64>) -> DVector<f64> {
        let m = 2 * (self.n_ratings - 1);
        let Some((rs1, rs2)) = self.likelihood_ratios(x) else {
            return DVector::from_element(m, f64::NEG_INFINITY);
        };

        let diffs: Vec<f64> = rs1
            .windows(2)
            .map(|w| w[0] - w[1])
            .chain(rs2.windows(2).map(|w| w[1] - w[0]))
            .collect();
        if diffs.iter().any(|d| !d.is_finite()) {
            return DVector::from_element(m, f64::NEG_INFINITY);
        }
        DVector::from_vec(diffs)
    }

    /// Squared-error loss between observed and model type-2 curves.
    ///
    /// Means and criteria are both taken in the shifted frame. Criteria are
    /// not offset a second time on top of the shifted means, so losses differ
    /// from double-shift formulations whenever the offset is non-zero.
    pub fn loss(&self, x: &DVector<f64>) -> f64 {
        let meta_d = x[0];
        let ev = Evidence::new(meta_d, self.s, self.offset(meta_d));
        let criteria: Vec<f64> = x.iter().skip(1).copied().collect();
        let estimated = model_rates(self.link, &ev, &criteria, 0.0, self.n_ratings, RATE_EPS);
        let loss = curve_loss(&self.observed, &estimated);
        if loss.is_finite() { loss } else { LOSS_SENTINEL }
    }
}

fn ratio(correct: f64, incorrect: f64) -> Option<f64> {
    let ok = |v: f64| v.is_finite() && v > 0.0;
    (ok(correct) && ok(incorrect)).then(|| correct / incorrect)
}

impl<L: Link + ?Sized> Problem for MetaDModel<'_, L> {
    fn dim(&self) -> usize {
        2 * self.n_ratings - 1
    }

    fn objective(&self, x: &DVector<f64>) -> f64 {
        self.loss(x)
    }

    fn constraints(&self, x: &DVector<f64>) -> DVector<f64> {
        self.idealization_diffs(x)
    }

    fn constraint_lower(&self) -> DVector<f64> {
        DVector::from_element(2 * (self.n_ratings - 1), self.beta)
    }
}
