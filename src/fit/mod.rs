//! Meta-d′ fitting.
//!
//! Responsibilities:
//!
//! - type-1 estimates and a feasible starting point (`guess`)
//! - bounds and ordering rows (`constraints`)
//! - loss and idealization constraint (`model`)
//! - solver orchestration and result packaging (`fitter`)

pub mod constraints;
pub mod fitter;
pub mod guess;
pub mod model;

pub use fitter::*;
pub use guess::TypeOne;
pub use model::{MetaDModel, curve_loss, observed_rates};
