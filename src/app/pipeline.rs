//! Shared evaluation pipeline.
//!
//! records -> confidence extraction -> discretization -> counts -> meta-d′ fit
//!
//! Front-ends (scripts, services, notebooks) only decide where records come
//! from and what to do with the resulting `Evaluation`.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::info;

use crate::data::{Discretizer, ExtractedTrials, accuracy_rate, trials2counts};
use crate::domain::{ConfidenceSource, CountOptions, EvalConfig, Evaluation};
use crate::error::DmcError;
use crate::fit::MetaDFitter;
use crate::io::read_trials;

/// One result file and how to read confidence from it.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalJob {
    pub path: PathBuf,
    pub source: ConfidenceSource,
}

/// Evaluate already-extracted trials.
pub fn evaluate(
    trials: &ExtractedTrials,
    config: &EvalConfig,
    source: Option<String>,
) -> Result<Evaluation, DmcError> {
    if trials.is_empty() {
        return Err(DmcError::invalid_input("no usable trials to evaluate."));
    }

    let ratings = Discretizer.apply(config.num_bins, &trials.probs, config.discretize)?;
    let accuracy = accuracy_rate(&trials.answers, &trials.labels);

    // Gold labels play the stimulus, extracted answers the response.
    let rating_codes: Vec<i64> = ratings.iter().map(|&r| r as i64).collect();
    let options = CountOptions {
        pad_cells: config.pad_cells,
        pad_amount: None,
    };
    let counts = trials2counts(&trials.labels, &trials.answers, &rating_codes, config.num_bins, options)?;

    let fit = MetaDFitter::new(config.fit.clone()).fit(&counts, config.beta, config.p)?;
    info!(
        source = source.as_deref().unwrap_or("<memory>"),
        n_trials = trials.len(),
        accuracy = accuracy.unwrap_or(f64::NAN),
        meta_da = fit.meta_da,
        m_ratio = fit.m_ratio,
        success = fit.success,
        "evaluation finished"
    );

    Ok(Evaluation {
        source,
        fit,
        counts,
        accuracy,
        n_trials: trials.len(),
        ratings,
    })
}

/// Read a line-delimited JSON result file and evaluate it.
pub fn evaluate_file(path: &Path, source: ConfidenceSource, config: &EvalConfig) -> Result<Evaluation, DmcError> {
    let trials = read_trials(path, source)?;
    evaluate(&trials, config, Some(path.display().to_string()))
}

/// Evaluate many files in parallel; results keep the job order.
pub fn evaluate_batch(jobs: &[EvalJob], config: &EvalConfig) -> Vec<Result<Evaluation, DmcError>> {
    jobs.par_iter()
        .map(|job| evaluate_file(&job.path, job.source, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LabelValue;

    fn calibrated_trials() -> ExtractedTrials {
        // Correct answers carry high confidence, wrong answers low confidence.
        let mut trials = ExtractedTrials::default();
        for i in 0..200 {
            let label = (i % 2) as i64;
            let correct = i % 5 != 0;
            let answer = if correct { label } else { 1 - label };
            let prob = if correct { 0.6 + 0.4 * ((i * 7) % 10) as f64 / 10.0 } else { 0.2 + 0.05 * (i % 4) as f64 };
            trials.answers.push(LabelValue::Int(answer));
            trials.labels.push(LabelValue::Int(label));
            trials.probs.push(prob);
        }
        trials
    }

    #[test]
    fn evaluate_counts_every_trial() {
        let trials = calibrated_trials();
        let evaluation = evaluate(&trials, &EvalConfig::default(), Some("memory".into())).unwrap();
        assert_eq!(evaluation.n_trials, 200);
        assert_eq!(evaluation.ratings.len(), 200);
        assert!((evaluation.accuracy.unwrap() - 0.8).abs() < 1e-12);
        // 200 trials plus 1/8 padding in each of 16 cells.
        assert!((evaluation.counts.total() - 202.0).abs() < 1e-9);
        assert!(evaluation.fit.da > 0.0);
    }

    #[test]
    fn empty_trials_are_rejected() {
        let err = evaluate(&ExtractedTrials::default(), &EvalConfig::default(), None);
        assert!(matches!(err, Err(DmcError::InvalidInput(_))));
    }
}
