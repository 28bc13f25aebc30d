//! `dmc-metad` library crate.
//!
//! Metacognitive efficiency (meta-d′) estimation from confidence-rated
//! answers:
//!
//! - confidence extraction and discretization (`data`)
//! - trial-to-count conversion (`data::counts`)
//! - constrained meta-d′ fitting (`fit`, on top of `optim`)
//! - evaluation pipeline, exports and text reports (`app`, `io`, `report`)

pub mod app;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod optim;
pub mod report;
