//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during counting and fitting
//! - exported to JSON alongside an evaluation
//! - reloaded later for comparisons

use serde::{Deserialize, Serialize};

use crate::domain::EvalConfig;
use crate::error::DmcError;
use crate::optim::SolverStatus;

/// Stimulus class (or the class named by a response).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stimulus {
    S1,
    S2,
}

impl Stimulus {
    /// `0 -> S1`, `1 -> S2`, anything else is not a valid class.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Stimulus::S1),
            1 => Some(Stimulus::S2),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Stimulus::S1 => 0,
            Stimulus::S2 => 1,
        }
    }
}

/// A raw answer or label value as it appears in parsed trial records.
///
/// Records carry option indices (`0`/`1`), booleans, or short text such as
/// `"yes"`/`"no"`. Only values that map onto `{0, 1}` take part in counting;
/// every variant takes part in accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl LabelValue {
    /// Binary class code used by the count builder.
    ///
    /// `"yes"` and `"no"` normalize to `1` and `0`; booleans map the same way.
    pub fn binary_code(&self) -> Option<u8> {
        match self {
            LabelValue::Bool(b) => Some(u8::from(*b)),
            LabelValue::Int(0) => Some(0),
            LabelValue::Int(1) => Some(1),
            LabelValue::Int(_) => None,
            LabelValue::Float(v) if *v == 0.0 => Some(0),
            LabelValue::Float(v) if *v == 1.0 => Some(1),
            LabelValue::Float(_) => None,
            LabelValue::Text(t) => match t.as_str() {
                "yes" => Some(1),
                "no" => Some(0),
                _ => None,
            },
        }
    }

    /// Equality used for accuracy: numbers and booleans compare by value,
    /// text compares exactly.
    pub fn same_answer(&self, other: &LabelValue) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (LabelValue::Text(a), LabelValue::Text(b)) => a == b,
                _ => false,
            },
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            LabelValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            LabelValue::Int(i) => Some(*i as f64),
            LabelValue::Float(v) => Some(*v),
            LabelValue::Text(_) => None,
        }
    }
}

impl From<i64> for LabelValue {
    fn from(value: i64) -> Self {
        LabelValue::Int(value)
    }
}

impl From<bool> for LabelValue {
    fn from(value: bool) -> Self {
        LabelValue::Bool(value)
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Text(value.to_string())
    }
}

/// One validated observation: true class, reported class, confidence rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub stimulus: Stimulus,
    pub response: Stimulus,
    /// Rating in `1..=n_ratings`.
    pub rating: usize,
}

impl Trial {
    /// Build a trial from raw codes, or `None` if any field is out of range.
    pub fn from_codes(stimulus: u8, response: u8, rating: i64, n_ratings: usize) -> Option<Self> {
        let stimulus = Stimulus::from_code(stimulus)?;
        let response = Stimulus::from_code(response)?;
        if rating < 1 || rating > n_ratings as i64 {
            return None;
        }
        Some(Self {
            stimulus,
            response,
            rating: rating as usize,
        })
    }

    pub fn is_correct(&self) -> bool {
        self.stimulus == self.response
    }
}

/// Rating-count table `(nR_S1, nR_S2)`.
///
/// Canonical order, for `n = n_ratings`:
/// - indices `0..n` are "S1" responses from the highest rating down to 1
/// - indices `n..2n` are "S2" responses from rating 1 up to the highest
///
/// `nr_s1` counts trials whose true stimulus was S1, `nr_s2` those with S2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCounts {
    pub nr_s1: Vec<f64>,
    pub nr_s2: Vec<f64>,
}

impl RatingCounts {
    /// Validate shape and contents.
    ///
    /// Both vectors must have the same even length of at least 4 (two
    /// ratings), and every entry must be finite and non-negative.
    pub fn new(nr_s1: Vec<f64>, nr_s2: Vec<f64>) -> Result<Self, DmcError> {
        if nr_s1.len() != nr_s2.len() {
            return Err(DmcError::input_shape(format!(
                "nR_S1 and nR_S2 must have the same number of elements (got {} and {}).",
                nr_s1.len(),
                nr_s2.len()
            )));
        }
        if nr_s1.len() % 2 != 0 {
            return Err(DmcError::input_shape(format!(
                "count vectors must have an even number of elements (got {}).",
                nr_s1.len()
            )));
        }
        if nr_s1.len() < 4 {
            return Err(DmcError::input_shape(
                "count vectors must describe at least 2 ratings.",
            ));
        }
        if nr_s1.iter().chain(nr_s2.iter()).any(|v| !v.is_finite() || *v < 0.0) {
            return Err(DmcError::invalid_input(
                "counts must be finite and non-negative.",
            ));
        }
        Ok(Self { nr_s1, nr_s2 })
    }

    pub fn n_ratings(&self) -> usize {
        self.nr_s1.len() / 2
    }

    pub fn has_zero_cells(&self) -> bool {
        self.nr_s1.iter().chain(self.nr_s2.iter()).any(|v| *v == 0.0)
    }

    pub fn total(&self) -> f64 {
        self.nr_s1.iter().chain(self.nr_s2.iter()).sum()
    }

    /// Add `amount` to every cell of both vectors.
    pub fn padded(&self, amount: f64) -> Self {
        Self {
            nr_s1: self.nr_s1.iter().map(|v| v + amount).collect(),
            nr_s2: self.nr_s2.iter().map(|v| v + amount).collect(),
        }
    }
}

/// Observed and model-implied type-2 rate curves.
///
/// Each curve has `n_ratings - 1` points; point `i` is the rate of ratings
/// strictly above `i + 1` among correct (HR2) or incorrect (FAR2) trials for
/// the given response side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateCurves {
    pub hr2_rs1: Vec<f64>,
    pub far2_rs1: Vec<f64>,
    pub hr2_rs2: Vec<f64>,
    pub far2_rs2: Vec<f64>,
}

/// Observed vs estimated type-2 curves at the solution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Type2Rates {
    pub observed: RateCurves,
    pub estimated: RateCurves,
}

/// Fit quantities in native units (S1 standard deviation = 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S1Units {
    pub d1: f64,
    pub meta_d1: f64,
    pub s: f64,
    pub meta_c1: f64,
    pub t2c1_rs1: Vec<f64>,
    pub t2c1_rs2: Vec<f64>,
}

/// Result of a meta-d′ fit.
///
/// RMS-unit quantities use `scale = sqrt(2 / (1 + s²)) · s`.
/// Callers must check `success`: a best-effort result is returned even when
/// the solver did not converge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub da: f64,
    pub s: f64,
    pub meta_da: f64,
    pub m_diff: f64,
    pub m_ratio: f64,
    pub meta_ca: f64,
    pub t2ca_rs1: Vec<f64>,
    pub t2ca_rs2: Vec<f64>,
    pub s1_units: S1Units,
    /// Squared-error loss at the solution.
    pub loss: f64,
    pub rates: Type2Rates,
    pub success: bool,
    pub status: SolverStatus,
    pub iterations: usize,
    /// Largest shortfall of the idealization constraint below `beta`.
    pub constraint_violation: f64,
    /// Loss at every accepted solver iteration of this fit.
    pub loss_trace: Vec<f64>,
    pub beta: f64,
    /// Accepted for interface compatibility; does not enter the loss or constraints.
    pub p: f64,
}

/// Everything produced for one evaluated result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Where the trials came from (file path or caller-chosen name).
    pub source: Option<String>,
    pub fit: FitResult,
    pub counts: RatingCounts,
    /// Share of extracted answers equal to their label.
    pub accuracy: Option<f64>,
    pub n_trials: usize,
    /// Discretized confidence rating of every extracted trial.
    pub ratings: Vec<usize>,
}

/// Portable JSON representation of an evaluation and its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFile {
    pub tool: String,
    pub config: EvalConfig,
    pub evaluation: Evaluation,
}
