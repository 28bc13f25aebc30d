//! Trust-region solver for bound, linear and nonlinear inequality constraints.
//!
//! Structure:
//!
//! - Bounds and linear rows form a region that iterates never leave. They
//!   enter the merit function through a log-barrier `-μ Σ ln(h - Gx)` and
//!   every step is cut back to 99.5% of the distance to that boundary.
//! - Nonlinear rows `c(x) >= l` enter through an augmented-Lagrangian term,
//!   so the starting point does not need to satisfy them.
//! - Each barrier stage runs a trust-region loop: finite-difference gradient
//!   and Jacobian, SR1 approximation of the objective Hessian, Steihaug-CG
//!   for the step, and the usual actual/predicted reduction ratio test.
//! - The first barrier weight is `initial_barrier · max(|f(x0)|, ‖∇f(x0)‖∞)`.
//! - Between stages the barrier shrinks, multipliers are updated, and the
//!   penalty grows when the nonlinear violation stalls.
//! - The returned point is the lowest-objective iterate that satisfies the
//!   nonlinear rows, when one was visited.
//!
//! Everything the solver accumulates (including the loss trace) lives in the
//! returned report; nothing survives between calls.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::numdiff::{Derivatives, two_point};
use super::problem::{Bounds, LinearConstraints, Problem, Region};
use super::steihaug::{Sr1, steihaug_cg};

const FRACTION_TO_BOUNDARY: f64 = 0.995;

/// Minimum actual/predicted reduction ratio for accepting a step.
const ACCEPT_RATIO: f64 = 1e-4;

/// Range of the objective scale used for the first barrier weight.
const MIN_OBJECTIVE_SCALE: f64 = 1e-12;
const MAX_OBJECTIVE_SCALE: f64 = 10.0;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// Final barrier stage converged with all nonlinear rows satisfied.
    Converged,
    /// Iteration cap reached.
    MaxIterations,
    /// Stages exhausted while nonlinear rows were still violated.
    Infeasible,
    /// Stages exhausted without the final stage converging.
    Stalled,
    /// Starting point was not strictly inside the bounds/linear region.
    InfeasibleStart,
    /// The optimizer was not started.
    NotRun,
}

/// Solver tolerances and schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Cap on trust-region iterations across all stages.
    pub max_iter: usize,
    /// Merit-gradient tolerance (infinity norm).
    pub gtol: f64,
    /// Trust radius below which a stage is considered converged.
    pub xtol: f64,
    /// Allowed shortfall of nonlinear rows at a successful solution.
    pub constraint_tol: f64,
    /// First barrier weight, relative to `max(|f(x0)|, ‖∇f(x0)‖∞)`.
    pub initial_barrier: f64,
    pub barrier_decay: f64,
    pub min_barrier: f64,
    pub initial_radius: f64,
    pub max_radius: f64,
    pub initial_penalty: f64,
    pub max_penalty: f64,
    pub max_stages: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iter: 3000,
            gtol: 1e-8,
            xtol: 1e-8,
            constraint_tol: 1e-6,
            initial_barrier: 1e-2,
            barrier_decay: 0.2,
            min_barrier: 1e-9,
            initial_radius: 1.0,
            max_radius: 1e3,
            initial_penalty: 10.0,
            max_penalty: 1e10,
            max_stages: 40,
        }
    }
}

/// Outcome of a solver run.
#[derive(Debug, Clone)]
pub struct SolverReport {
    pub x: DVector<f64>,
    /// Objective value at `x`.
    pub fun: f64,
    pub status: SolverStatus,
    pub iterations: usize,
    /// Largest `l_i - c_i(x)` (0 when every nonlinear row holds).
    pub constraint_violation: f64,
    /// Objective at the start and at every accepted step.
    pub loss_trace: Vec<f64>,
}

impl SolverReport {
    pub fn success(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

struct Point {
    x: DVector<f64>,
    f: f64,
    c: DVector<f64>,
    slack: DVector<f64>,
    derivs: Derivatives,
}

/// Barrier + augmented-Lagrangian merit function for one stage.
struct Merit {
    mu: f64,
    rho: f64,
    lambda: DVector<f64>,
    lower: DVector<f64>,
}

impl Merit {
    /// `t_i = l_i - c_i + λ_i/ρ`; the penalty is active where `t_i > 0`.
    fn shifted(&self, c: &DVector<f64>, i: usize) -> f64 {
        self.lower[i] - c[i] + self.lambda[i] / self.rho
    }

    fn value(&self, f: f64, c: &DVector<f64>, slack: &DVector<f64>) -> f64 {
        if !f.is_finite() || slack.iter().any(|s| *s <= 0.0) {
            return f64::INFINITY;
        }
        let mut total = f;
        for i in 0..c.len() {
            let t = self.shifted(c, i);
            if t.is_nan() {
                return f64::INFINITY;
            }
            if t > 0.0 {
                total += 0.5 * self.rho * t * t;
            }
        }
        for s in slack.iter() {
            total -= self.mu * s.ln();
        }
        if total.is_nan() { f64::INFINITY } else { total }
    }

    fn gradient(&self, point: &Point, region: &Region) -> DVector<f64> {
        let mut grad = point.derivs.grad.clone();
        for i in 0..point.c.len() {
            let t = self.shifted(&point.c, i);
            if t > 0.0 && t.is_finite() {
                let row = point.derivs.jac.row(i).transpose();
                grad -= row * (self.rho * t);
            }
        }
        for j in 0..point.slack.len() {
            let row = region.g.row(j).transpose();
            grad += row * (self.mu / point.slack[j]);
        }
        grad
    }

    fn hessian(&self, b: &DMatrix<f64>, point: &Point, region: &Region) -> DMatrix<f64> {
        let mut hess = b.clone();
        for i in 0..point.c.len() {
            let t = self.shifted(&point.c, i);
            if t > 0.0 && t.is_finite() {
                let row = point.derivs.jac.row(i).transpose();
                hess += &row * row.transpose() * self.rho;
            }
        }
        for j in 0..point.slack.len() {
            let row = region.g.row(j).transpose();
            let w = self.mu / (point.slack[j] * point.slack[j]);
            hess += &row * row.transpose() * w;
        }
        hess
    }
}

fn max_violation(c: &DVector<f64>, lower: &DVector<f64>) -> f64 {
    c.iter()
        .zip(lower.iter())
        .map(|(ci, li)| if ci.is_nan() { f64::INFINITY } else { (li - ci).max(0.0) })
        .fold(0.0, f64::max)
}

/// Minimize `problem` from `x0`.
///
/// `x0` must lie strictly inside the bounds and linear rows; otherwise the
/// report comes back with `SolverStatus::InfeasibleStart` and `x0` untouched.
pub fn minimize<P: Problem + ?Sized>(
    problem: &P,
    x0: DVector<f64>,
    bounds: &Bounds,
    linear: Option<&LinearConstraints>,
    options: &SolverOptions,
) -> SolverReport {
    let n = x0.len();
    let region = Region::assemble(bounds, linear);
    let lower = problem.constraint_lower();

    let f0 = problem.objective(&x0);
    let c0 = problem.constraints(&x0);
    if !region.strictly_contains(&x0) {
        let constraint_violation = max_violation(&c0, &lower);
        return SolverReport {
            x: x0,
            fun: f0,
            status: SolverStatus::InfeasibleStart,
            iterations: 0,
            constraint_violation,
            loss_trace: Vec::new(),
        };
    }

    let slack0 = region.slack(&x0);
    let derivs0 = two_point(problem, &region, &x0, f0, &c0);
    let mut point = Point {
        x: x0,
        f: f0,
        c: c0,
        slack: slack0,
        derivs: derivs0,
    };

    let m = lower.len();
    let objective_scale = point
        .f
        .abs()
        .max(point.derivs.grad.amax())
        .clamp(MIN_OBJECTIVE_SCALE, MAX_OBJECTIVE_SCALE);
    let mut merit = Merit {
        mu: (options.initial_barrier * objective_scale).max(options.min_barrier),
        rho: options.initial_penalty,
        lambda: DVector::zeros(m),
        lower,
    };
    let mut sr1 = Sr1::new(n);
    let mut radius = options.initial_radius;
    let mut iterations = 0usize;
    let mut loss_trace = vec![point.f];
    let mut prev_violation = max_violation(&point.c, &merit.lower);
    let mut best =
        (prev_violation <= options.constraint_tol).then(|| (point.x.clone(), point.f, point.c.clone()));
    let mut status = SolverStatus::Stalled;

    'stages: for stage in 0..options.max_stages {
        let tol = options.gtol.max(merit.mu);
        let mut stage_converged = false;

        loop {
            if iterations >= options.max_iter {
                status = SolverStatus::MaxIterations;
                break 'stages;
            }

            let grad = merit.gradient(&point, &region);
            if grad.amax() <= tol {
                stage_converged = true;
                break;
            }
            let hess = merit.hessian(&sr1.b, &point, &region);

            let mut step = steihaug_cg(&hess, &grad, radius);
            let alpha = region.step_fraction(&point.slack, &step, FRACTION_TO_BOUNDARY);
            step *= alpha;
            iterations += 1;

            let step_norm = step.norm();
            let predicted = -(grad.dot(&step) + 0.5 * step.dot(&(&hess * &step)));

            let x_new = &point.x + &step;
            let f_new = problem.objective(&x_new);
            let c_new = problem.constraints(&x_new);
            let slack_new = region.slack(&x_new);

            let merit_now = merit.value(point.f, &point.c, &point.slack);
            let merit_new = merit.value(f_new, &c_new, &slack_new);
            let ratio = if predicted > 0.0 && merit_new.is_finite() {
                (merit_now - merit_new) / predicted
            } else {
                -1.0
            };

            if ratio < 0.25 {
                radius = 0.25 * if step_norm > 0.0 { step_norm } else { radius };
            } else if ratio > 0.75 && step_norm >= 0.8 * radius {
                radius = (2.0 * radius).min(options.max_radius);
            }

            if ratio > ACCEPT_RATIO {
                let derivs = two_point(problem, &region, &x_new, f_new, &c_new);
                let y = &derivs.grad - &point.derivs.grad;
                sr1.update(&step, &y);
                point = Point {
                    x: x_new,
                    f: f_new,
                    c: c_new,
                    slack: slack_new,
                    derivs,
                };
                loss_trace.push(point.f);

                let feasible = max_violation(&point.c, &merit.lower) <= options.constraint_tol;
                if feasible && best.as_ref().is_none_or(|(_, f, _)| point.f < *f) {
                    best = Some((point.x.clone(), point.f, point.c.clone()));
                }
            }

            let x_scale = 1.0 + point.x.norm();
            if radius < options.xtol * x_scale || step_norm < options.xtol * x_scale {
                stage_converged = true;
                break;
            }
        }

        let violation = max_violation(&point.c, &merit.lower);
        debug!(
            stage,
            barrier = merit.mu,
            penalty = merit.rho,
            violation,
            loss = point.f,
            iterations,
            "barrier stage finished"
        );

        let final_barrier = merit.mu <= options.min_barrier;
        if final_barrier && stage_converged && violation <= options.constraint_tol {
            status = SolverStatus::Converged;
            break;
        }

        for i in 0..m {
            let gap = merit.lower[i] - point.c[i];
            if gap.is_finite() {
                merit.lambda[i] = (merit.lambda[i] + merit.rho * gap).max(0.0);
            }
        }
        if violation > options.constraint_tol && violation > 0.25 * prev_violation {
            merit.rho = (merit.rho * 10.0).min(options.max_penalty);
        }
        prev_violation = violation;
        merit.mu = (merit.mu * options.barrier_decay).max(options.min_barrier);
        radius = radius.max(0.1 * options.initial_radius);
    }

    let (mut x, mut fun, mut c) = (point.x, point.f, point.c);
    if let Some((best_x, best_f, best_c)) = best {
        if best_f < fun {
            debug!(final_loss = fun, best_loss = best_f, "returning best feasible iterate");
            (x, fun, c) = (best_x, best_f, best_c);
        }
    }

    let constraint_violation = max_violation(&c, &merit.lower);
    if status == SolverStatus::Stalled && constraint_violation > options.constraint_tol {
        status = SolverStatus::Infeasible;
    }

    SolverReport {
        x,
        fun,
        status,
        iterations,
        constraint_violation,
        loss_trace,
    }
}
