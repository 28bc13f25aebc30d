//! Problem definition for the constrained solver.
//!
//! A problem is:
//!
//! ```text
//! minimize f(x)
//! subject to  lower <= x <= upper        (bounds)
//!             A x <= b                    (linear)
//!             c(x) >= c_lower             (nonlinear)
//! ```
//!
//! Bounds and linear rows are merged into one polyhedral region `G x <= h`
//! that every iterate stays strictly inside. Nonlinear rows may be violated
//! along the way.

use nalgebra::{DMatrix, DVector};

/// Objective and nonlinear constraints of an optimization problem.
///
/// Implementations must be pure: the solver evaluates them at arbitrary
/// points in any order.
pub trait Problem {
    fn dim(&self) -> usize;

    /// Objective value. May be non-finite at degenerate points; the solver
    /// treats such points as infinitely bad.
    fn objective(&self, x: &DVector<f64>) -> f64;

    /// Nonlinear constraint values `c(x)`.
    ///
    /// Degenerate points should report `f64::NEG_INFINITY` so they read as
    /// maximally violating.
    fn constraints(&self, x: &DVector<f64>) -> DVector<f64> {
        let _ = x;
        DVector::zeros(0)
    }

    /// Lower bounds `c_lower`, same length as `constraints`.
    fn constraint_lower(&self) -> DVector<f64> {
        DVector::zeros(0)
    }
}

/// Box constraints. Infinite entries are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

/// Linear inequality rows `a x <= upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraints {
    pub a: DMatrix<f64>,
    pub upper: DVector<f64>,
}

/// Strictly-kept region `G x <= h` built from bounds and linear rows.
#[derive(Debug, Clone)]
pub(crate) struct Region {
    pub g: DMatrix<f64>,
    pub h: DVector<f64>,
}

impl Region {
    pub fn assemble(bounds: &Bounds, linear: Option<&LinearConstraints>) -> Self {
        let n = bounds.lower.len();
        let mut rows: Vec<(Vec<f64>, f64)> = Vec::new();

        for j in 0..n {
            if bounds.lower[j].is_finite() {
                let mut row = vec![0.0; n];
                row[j] = -1.0;
                rows.push((row, -bounds.lower[j]));
            }
            if bounds.upper[j].is_finite() {
                let mut row = vec![0.0; n];
                row[j] = 1.0;
                rows.push((row, bounds.upper[j]));
            }
        }
        if let Some(lin) = linear {
            for i in 0..lin.a.nrows() {
                if !lin.upper[i].is_finite() {
                    continue;
                }
                let row: Vec<f64> = lin.a.row(i).iter().copied().collect();
                rows.push((row, lin.upper[i]));
            }
        }

        let mut g = DMatrix::<f64>::zeros(rows.len(), n);
        let mut h = DVector::<f64>::zeros(rows.len());
        for (i, (row, rhs)) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                g[(i, j)] = v;
            }
            h[i] = rhs;
        }
        Self { g, h }
    }

    /// Slack `h - G x`; positive entries mean strictly inside.
    pub fn slack(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.h - &self.g * x
    }

    pub fn strictly_contains(&self, x: &DVector<f64>) -> bool {
        self.slack(x).iter().all(|s| *s > 0.0)
    }

    /// Largest `α <= 1` keeping `slack(x + α p) >= (1 - tau) · slack(x)`.
    pub fn step_fraction(&self, slack: &DVector<f64>, p: &DVector<f64>, tau: f64) -> f64 {
        let gp = &self.g * p;
        let mut alpha: f64 = 1.0;
        for i in 0..gp.len() {
            if gp[i] > 0.0 {
                alpha = alpha.min(tau * slack[i] / gp[i]);
            }
        }
        alpha.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_merges_bounds_and_linear_rows() {
        let bounds = Bounds {
            lower: DVector::from_row_slice(&[0.0, f64::NEG_INFINITY]),
            upper: DVector::from_row_slice(&[1.0, f64::INFINITY]),
        };
        let linear = LinearConstraints {
            a: DMatrix::from_row_slice(1, 2, &[1.0, -1.0]),
            upper: DVector::from_row_slice(&[-0.5]),
        };
        let region = Region::assemble(&bounds, Some(&linear));
        assert_eq!(region.g.nrows(), 3);

        assert!(region.strictly_contains(&DVector::from_row_slice(&[0.5, 2.0])));
        assert!(!region.strictly_contains(&DVector::from_row_slice(&[0.5, 0.8])));
        assert!(!region.strictly_contains(&DVector::from_row_slice(&[1.0, 3.0])));
    }

    #[test]
    fn step_fraction_stops_short_of_the_boundary() {
        let bounds = Bounds {
            lower: DVector::from_row_slice(&[0.0]),
            upper: DVector::from_row_slice(&[1.0]),
        };
        let region = Region::assemble(&bounds, None);
        let x = DVector::from_row_slice(&[0.5]);
        let slack = region.slack(&x);
        let p = DVector::from_row_slice(&[2.0]);
        let alpha = region.step_fraction(&slack, &p, 0.995);
        assert!((alpha - 0.995 * 0.25).abs() < 1e-12);
        assert!(region.strictly_contains(&(x + p * alpha)));
    }
}
