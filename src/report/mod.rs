//! Reporting utilities: formatted terminal output for evaluations.

pub mod format;

pub use format::*;
