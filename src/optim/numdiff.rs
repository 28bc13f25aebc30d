//! Two-point finite differences for the objective gradient and the
//! constraint Jacobian.
//!
//! Forward steps are used by default. When the forward point leaves the
//! strictly-feasible region, or the problem reports a non-finite value there,
//! the step is taken backwards instead. A column that is non-finite both ways
//! is zeroed so it cannot poison the quadratic model.

use nalgebra::{DMatrix, DVector};

use super::problem::{Problem, Region};

/// Relative step: `sqrt(machine epsilon)`.
const REL_STEP: f64 = 1.490_116_119_384_765_6e-8;

pub(crate) struct Derivatives {
    pub grad: DVector<f64>,
    /// `m × n`, row `i` is `∇c_i`.
    pub jac: DMatrix<f64>,
}

pub(crate) fn two_point<P: Problem + ?Sized>(
    problem: &P,
    region: &Region,
    x: &DVector<f64>,
    f0: f64,
    c0: &DVector<f64>,
) -> Derivatives {
    let n = x.len();
    let m = c0.len();
    let mut grad = DVector::<f64>::zeros(n);
    let mut jac = DMatrix::<f64>::zeros(m, n);

    for j in 0..n {
        let h = REL_STEP * x[j].abs().max(1.0);

        let (step, f1, c1) = match evaluate_offset(problem, region, x, j, h) {
            Some(v) => v,
            None => match evaluate_offset(problem, region, x, j, -h) {
                Some(v) => v,
                None => continue,
            },
        };

        grad[j] = (f1 - f0) / step;
        for i in 0..m {
            let d = (c1[i] - c0[i]) / step;
            jac[(i, j)] = if d.is_finite() { d } else { 0.0 };
        }
    }

    Derivatives { grad, jac }
}

fn evaluate_offset<P: Problem + ?Sized>(
    problem: &P,
    region: &Region,
    x: &DVector<f64>,
    j: usize,
    h: f64,
) -> Option<(f64, f64, DVector<f64>)> {
    let mut xp = x.clone();
    xp[j] += h;
    // Recompute the realized step to absorb rounding in `x + h`.
    let step = xp[j] - x[j];
    if step == 0.0 || !region.strictly_contains(&xp) {
        return None;
    }
    let f1 = problem.objective(&xp);
    let c1 = problem.constraints(&xp);
    if !f1.is_finite() || c1.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some((step, f1, c1))
}
