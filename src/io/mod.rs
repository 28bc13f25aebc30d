//! Input/output helpers.
//!
//! - line-delimited JSON result files (`records`)
//! - evaluation JSON and count CSV exports (`export`)

pub mod export;
pub mod records;

pub use export::*;
pub use records::*;
