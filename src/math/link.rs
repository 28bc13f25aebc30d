//! Link functions between the latent evidence axis and response probabilities.
//!
//! The fitter only needs three primitives:
//! - `cdf(x; μ, σ)` for mass below a criterion
//! - `sf(x; μ, σ)` for mass above a criterion
//! - the standard inverse cdf for turning observed rates into z-scores
//!
//! Numerical notes:
//! - Upper-tail masses are computed directly from `erfc` instead of `1 - cdf`.
//!   Far-out criteria otherwise round to exactly zero mass, which the
//!   idealization constraint treats as a degenerate point.
//! - `inverse_cdf(0) = -inf` and `inverse_cdf(1) = +inf`; callers that feed
//!   unpadded rates must be ready for non-finite z-scores.

use statrs::function::erf::{erfc, erfc_inv};

/// A location-scale family usable as the signal-detection noise model.
pub trait Link: Send + Sync {
    /// `P(X <= x)` for `X` with the given mean and standard deviation.
    fn cdf(&self, x: f64, mean: f64, sd: f64) -> f64;

    /// `P(X > x)`.
    fn sf(&self, x: f64, mean: f64, sd: f64) -> f64 {
        1.0 - self.cdf(x, mean, sd)
    }

    /// Standard (mean 0, sd 1) quantile function.
    fn inverse_cdf(&self, p: f64) -> f64;
}

/// Gaussian link (equal-variance SDT when `s = 1`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardNormal;

impl Link for StandardNormal {
    fn cdf(&self, x: f64, mean: f64, sd: f64) -> f64 {
        if x == f64::INFINITY {
            return 1.0;
        }
        if x == f64::NEG_INFINITY {
            return 0.0;
        }
        let z = (x - mean) / sd;
        0.5 * erfc(-z / std::f64::consts::SQRT_2)
    }

    fn sf(&self, x: f64, mean: f64, sd: f64) -> f64 {
        if x == f64::INFINITY {
            return 0.0;
        }
        if x == f64::NEG_INFINITY {
            return 1.0;
        }
        let z = (x - mean) / sd;
        0.5 * erfc(z / std::f64::consts::SQRT_2)
    }

    fn inverse_cdf(&self, p: f64) -> f64 {
        if p.is_nan() {
            return f64::NAN;
        }
        if p <= 0.0 {
            return f64::NEG_INFINITY;
        }
        if p >= 1.0 {
            return f64::INFINITY;
        }
        -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
    }
}
