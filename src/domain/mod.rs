//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - trial-level inputs (`Trial`, `Stimulus`, `LabelValue`)
//! - the rating-count table (`RatingCounts`)
//! - fit outputs (`FitResult`, `S1Units`, `Type2Rates`)
//! - configuration (`EvalConfig`, `FitOptions`, `CountOptions`) and mode enums

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
