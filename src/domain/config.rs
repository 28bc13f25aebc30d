//! Run configuration and the small enums that select behavior.
//!
//! Textual mode names from record files or the environment are resolved into
//! these enums once, at the edge; the core only ever matches on variants.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DmcError;
use crate::optim::SolverOptions;

/// Rating discretization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscretizeKind {
    /// Equal-width intervals over the observed `[min, max]` range.
    EqualWidth,
}

impl FromStr for DiscretizeKind {
    type Err = DmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equal_width" => Ok(DiscretizeKind::EqualWidth),
            other => Err(DmcError::UnsupportedMode(format!(
                "discretization type '{other}' is not available (supported: equal_width)."
            ))),
        }
    }
}

/// Where the type-1 criterion sits once meta-d′ replaces d′.
///
/// The fitter works in a frame where the type-1 criterion is 0; this selects
/// the offset used to move between that frame and native units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantCriterion {
    /// `meta_d · t1c1 / d1`: criterion scales with sensitivity.
    Relative,
    /// `t1c1`: criterion stays where the type-1 fit put it.
    Absolute,
    /// `0`: unbiased observer.
    Zero,
}

impl ConstantCriterion {
    pub fn offset(self, meta_d: f64, t1c1: f64, d1: f64) -> f64 {
        match self {
            ConstantCriterion::Relative => meta_d * (t1c1 / d1),
            ConstantCriterion::Absolute => t1c1,
            ConstantCriterion::Zero => 0.0,
        }
    }
}

/// How a confidence score and a single answer are extracted from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    /// One answer with a verbalized probability.
    Verbal,
    /// Top-k answers with probabilities; the most probable one is kept.
    TopK,
    /// Several sampled answers; the majority answer and its frequency are kept.
    Consistency,
    /// Several sampled `[answer, probability]` pairs; probabilities are
    /// averaged per answer and the best-scoring answer is kept.
    VerbalConsistency,
    /// Several sampled top-k lists; each list contributes its most probable
    /// answer, then probabilities are averaged per answer as above.
    VerbalConsistencyTopK,
}

impl ConfidenceSource {
    /// Resolve a `(method, prompting)` pair as written in result file names.
    pub fn resolve(method: &str, prompting: &str) -> Result<Self, DmcError> {
        let source = match (method, prompting) {
            ("verb_confidence", "vanilla" | "self_probing" | "multi_steps" | "cot") => {
                ConfidenceSource::Verbal
            }
            ("verb_confidence", "topk") => ConfidenceSource::TopK,
            (
                "consis_confidence" | "consis_disturb_confidence" | "consis_misleading_confidence",
                "zero_shot",
            ) => ConfidenceSource::Consistency,
            ("verbis_confidence", "vanilla") => ConfidenceSource::VerbalConsistency,
            ("verbis_confidence", "topk") => ConfidenceSource::VerbalConsistencyTopK,
            _ => {
                return Err(DmcError::UnsupportedMode(format!(
                    "no confidence extraction for method '{method}' with prompting '{prompting}'."
                )));
            }
        };
        Ok(source)
    }
}

/// Options for building a rating-count table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountOptions {
    /// Add `pad_amount` to every cell after counting.
    pub pad_cells: bool,
    /// Defaults to `1 / (2 · n_ratings)`.
    pub pad_amount: Option<f64>,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            pad_cells: true,
            pad_amount: None,
        }
    }
}

impl CountOptions {
    pub fn unpadded() -> Self {
        Self {
            pad_cells: false,
            pad_amount: None,
        }
    }

    pub fn resolved_pad_amount(&self, n_ratings: usize) -> f64 {
        self.pad_amount
            .unwrap_or_else(|| 1.0 / (2.0 * n_ratings as f64))
    }
}

/// Options that affect how a single meta-d′ fit is calibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Ratio of the S1 to the S2 standard deviation.
    pub s: f64,
    /// Seed for the initial meta-d′ guess.
    ///
    /// When `None` the seed is derived from `beta`, which then serves both as
    /// seed and as the idealization-constraint lower bound.
    pub seed: Option<u64>,
    pub constant_criterion: ConstantCriterion,
    /// Minimum separation between adjacent criteria and from the type-1 criterion.
    pub min_criterion_gap: f64,
    /// Type-2 criteria live in `[-criterion_bound, criterion_bound]`.
    pub criterion_bound: f64,
    pub solver: SolverOptions,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            s: 1.0,
            seed: None,
            constant_criterion: ConstantCriterion::Relative,
            min_criterion_gap: 0.05,
            criterion_bound: 20.0,
            solver: SolverOptions::default(),
        }
    }
}

/// Full configuration for evaluating one experiment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub num_bins: usize,
    pub discretize: DiscretizeKind,
    /// Idealization-constraint lower bound (and default seed).
    pub beta: f64,
    /// Carried through to the fit result; not used by the loss.
    pub p: f64,
    pub pad_cells: bool,
    pub fit: FitOptions,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            num_bins: 4,
            discretize: DiscretizeKind::EqualWidth,
            beta: 0.0,
            p: 0.0,
            pad_cells: true,
            fit: FitOptions::default(),
        }
    }
}

impl EvalConfig {
    /// Defaults overridden by `DMC_*` variables (a `.env` file is loaded first).
    pub fn from_env() -> Result<Self, DmcError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EvalConfig::from_env`] but reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DmcError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<usize, _>(&lookup, "DMC_NUM_BINS")? {
            if v < 2 {
                return Err(DmcError::InvalidConfig("DMC_NUM_BINS must be >= 2.".into()));
            }
            config.num_bins = v;
        }
        if let Some(raw) = lookup("DMC_DISCRETIZE") {
            config.discretize = raw.trim().parse()?;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "DMC_BETA")? {
            config.beta = v;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "DMC_P")? {
            config.p = v;
        }
        if let Some(raw) = lookup("DMC_PAD_CELLS") {
            config.pad_cells = match raw.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => {
                    return Err(DmcError::InvalidConfig(format!(
                        "DMC_PAD_CELLS must be 0/1/true/false, got '{other}'."
                    )));
                }
            };
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "DMC_SEED")? {
            config.fit.seed = Some(v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "DMC_MAX_ITER")? {
            config.fit.solver.max_iter = v;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, DmcError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| DmcError::InvalidConfig(format!("{key} has an invalid value: '{raw}'.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn unknown_discretization_is_unsupported() {
        assert_eq!("equal_width".parse::<DiscretizeKind>().unwrap(), DiscretizeKind::EqualWidth);
        assert!(matches!(
            "equal_freq".parse::<DiscretizeKind>(),
            Err(DmcError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn relative_criterion_scales_with_meta_d() {
        let cc = ConstantCriterion::Relative;
        assert!((cc.offset(1.0, 0.5, 2.0) - 0.25).abs() < 1e-12);
        assert_eq!(ConstantCriterion::Zero.offset(1.0, 0.5, 2.0), 0.0);
        assert_eq!(ConstantCriterion::Absolute.offset(1.0, 0.5, 2.0), 0.5);
    }

    #[test]
    fn confidence_source_resolves_known_pairs() {
        assert_eq!(
            ConfidenceSource::resolve("verb_confidence", "cot").unwrap(),
            ConfidenceSource::Verbal
        );
        assert_eq!(
            ConfidenceSource::resolve("consis_disturb_confidence", "zero_shot").unwrap(),
            ConfidenceSource::Consistency
        );
        assert_eq!(
            ConfidenceSource::resolve("verbis_confidence", "topk").unwrap(),
            ConfidenceSource::VerbalConsistencyTopK
        );
        assert!(ConfidenceSource::resolve("verb_confidence", "zero_shot").is_err());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("DMC_NUM_BINS", "5"),
            ("DMC_BETA", "0.25"),
            ("DMC_PAD_CELLS", "0"),
            ("DMC_SEED", "7"),
        ]
        .into_iter()
        .collect();
        let config = EvalConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.num_bins, 5);
        assert_eq!(config.beta, 0.25);
        assert!(!config.pad_cells);
        assert_eq!(config.fit.seed, Some(7));
        assert_eq!(config.discretize, DiscretizeKind::EqualWidth);
    }

    #[test]
    fn lookup_rejects_malformed_values() {
        let err = EvalConfig::from_lookup(|k| (k == "DMC_BETA").then(|| "abc".to_string()));
        assert!(matches!(err, Err(DmcError::InvalidConfig(_))));
    }

    #[test]
    fn default_pad_amount_depends_on_ratings() {
        assert!((CountOptions::default().resolved_pad_amount(4) - 0.125).abs() < 1e-12);
    }
}
