//! Constrained nonlinear optimization.
//!
//! - problem definition: objective, bounds, linear and nonlinear rows (`problem`)
//! - two-point finite differences (`numdiff`)
//! - Steihaug-CG subproblem and SR1 Hessian update (`steihaug`)
//! - the barrier / trust-region driver (`trust_constr`)

mod numdiff;
pub mod problem;
mod steihaug;
pub mod trust_constr;

pub use problem::{Bounds, LinearConstraints, Problem};
pub use trust_constr::*;
