//! Top-level orchestration.
//!
//! This module is the library's "real main":
//! - resolves configuration from the environment
//! - runs the evaluation pipeline on one or more result files
//! - formats or exports the outcome

use std::path::Path;

use crate::domain::{ConfidenceSource, EvalConfig, Evaluation};
use crate::error::DmcError;
use crate::io::write_evaluation_json;
use crate::report::format_evaluation;

pub mod pipeline;

pub use pipeline::{EvalJob, evaluate, evaluate_batch, evaluate_file};

/// Evaluate one file with environment-driven configuration.
///
/// Writes the evaluation JSON to `export` when given and returns the
/// evaluation together with its text summary.
pub fn run_file(
    path: &Path,
    method: &str,
    prompting: &str,
    export: Option<&Path>,
) -> Result<(Evaluation, String), DmcError> {
    let config = EvalConfig::from_env()?;
    let source = ConfidenceSource::resolve(method, prompting)?;
    let evaluation = evaluate_file(path, source, &config)?;
    if let Some(out) = export {
        write_evaluation_json(out, &evaluation, &config)?;
    }
    let summary = format_evaluation(&evaluation);
    Ok((evaluation, summary))
}
