//! Trust-region subproblem and quasi-Newton Hessian update.
//!
//! The subproblem
//!
//! ```text
//! minimize  gᵀp + ½ pᵀHp   subject to ‖p‖ <= Δ
//! ```
//!
//! is solved approximately with truncated conjugate gradients (Steihaug).
//! `H` may be indefinite: SR1 updates do not preserve positive definiteness,
//! and CG follows negative curvature straight to the trust-region boundary.

use nalgebra::{DMatrix, DVector};

/// Approximate minimizer of the quadratic model inside the trust region.
pub(crate) fn steihaug_cg(h: &DMatrix<f64>, g: &DVector<f64>, radius: f64) -> DVector<f64> {
    let n = g.len();
    let mut z = DVector::<f64>::zeros(n);
    let g_norm = g.norm();
    if g_norm == 0.0 || !g_norm.is_finite() {
        return z;
    }
    let tol = g_norm.sqrt().min(0.5) * g_norm;

    let mut r = g.clone();
    let mut d = -g;

    for _ in 0..(2 * n).max(1) {
        let hd = h * &d;
        let curvature = d.dot(&hd);
        if curvature <= 0.0 {
            let tau = to_boundary(&z, &d, radius);
            return z + d * tau;
        }

        let rr = r.dot(&r);
        let alpha = rr / curvature;
        let z_next = &z + &d * alpha;
        if z_next.norm() >= radius {
            let tau = to_boundary(&z, &d, radius);
            return z + d * tau;
        }

        let r_next = &r + &hd * alpha;
        if r_next.norm() < tol {
            return z_next;
        }

        let beta = r_next.dot(&r_next) / rr;
        d = -&r_next + &d * beta;
        r = r_next;
        z = z_next;
    }

    z
}

/// Positive `τ` with `‖z + τ d‖ = radius`.
fn to_boundary(z: &DVector<f64>, d: &DVector<f64>, radius: f64) -> f64 {
    let a = d.dot(d);
    if a == 0.0 {
        return 0.0;
    }
    let b = 2.0 * z.dot(d);
    let c = z.dot(z) - radius * radius;
    let disc = (b * b - 4.0 * a * c).max(0.0);
    (-b + disc.sqrt()) / (2.0 * a)
}

/// Symmetric rank-one Hessian approximation.
#[derive(Debug, Clone)]
pub(crate) struct Sr1 {
    pub b: DMatrix<f64>,
    scaled: bool,
}

impl Sr1 {
    pub fn new(n: usize) -> Self {
        Self {
            b: DMatrix::identity(n, n),
            scaled: false,
        }
    }

    /// Update with step `s` and gradient change `y`.
    ///
    /// The first update with positive curvature rescales the identity to
    /// `yᵀy / yᵀs` before applying the rank-one correction. Updates whose
    /// denominator is tiny relative to `‖s‖‖r‖` are skipped.
    pub fn update(&mut self, s: &DVector<f64>, y: &DVector<f64>) {
        if s.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return;
        }
        if !self.scaled {
            let ys = y.dot(s);
            let yy = y.dot(y);
            if ys > 0.0 && yy > 0.0 {
                let n = self.b.nrows();
                self.b = DMatrix::identity(n, n) * (yy / ys);
                self.scaled = true;
            }
        }

        let r = y - &self.b * s;
        let denom = r.dot(s);
        if denom.abs() <= 1e-8 * s.norm() * r.norm() || denom == 0.0 {
            return;
        }
        self.b += &r * r.transpose() / denom;
    }
}
