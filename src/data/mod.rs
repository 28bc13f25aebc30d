//! Data preparation ahead of the fit.
//!
//! - confidence extraction from result records (`records`)
//! - confidence discretization (`discretize`)
//! - trial-to-count conversion (`counts`)
//! - synthetic observers for validation (`sample`)

pub mod counts;
pub mod discretize;
pub mod records;
pub mod sample;

pub use counts::*;
pub use discretize::*;
pub use records::*;
pub use sample::*;
