//! Per-question result records and confidence extraction.
//!
//! Every record yields at most one `(answer, label, confidence)` triple.
//! Records that are incomplete or carry a probability outside `[0, 1]` are
//! skipped; records whose JSON shape does not match the chosen source are an
//! error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ConfidenceSource, LabelValue};
use crate::error::DmcError;

/// One answer with a verbalized probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleAnswerRecord {
    #[serde(default)]
    pub idx: Option<i64>,
    pub answer: Option<LabelValue>,
    pub label: LabelValue,
    pub prob: Option<f64>,
}

/// Several answers, optionally with one probability each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAnswerRecord {
    #[serde(default)]
    pub idx: Option<i64>,
    pub answers: Vec<Option<LabelValue>>,
    pub label: LabelValue,
    #[serde(default)]
    pub probs: Vec<Option<f64>>,
}

/// Several sampled `[answer, probability]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledPairsRecord {
    #[serde(default)]
    pub idx: Option<i64>,
    pub answers: Vec<(Option<LabelValue>, Option<f64>)>,
    pub label: LabelValue,
}

/// Several sampled top-k lists, each `[answers, probabilities]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledTopKRecord {
    #[serde(default)]
    pub idx: Option<i64>,
    pub answers: Vec<(Vec<Option<LabelValue>>, Vec<Option<f64>>)>,
    pub label: LabelValue,
}

/// Parallel sequences of extracted answers, gold labels and confidences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTrials {
    pub answers: Vec<LabelValue>,
    pub labels: Vec<LabelValue>,
    pub probs: Vec<f64>,
}

impl ExtractedTrials {
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    fn push(&mut self, answer: LabelValue, label: LabelValue, prob: f64) {
        self.answers.push(answer);
        self.labels.push(label);
        self.probs.push(prob);
    }
}

fn is_probability(p: f64) -> bool {
    (0.0..=1.0).contains(&p)
}

/// Extract a single trial from a verbalized-confidence record.
pub fn from_single_answer(record: SingleAnswerRecord) -> Option<(LabelValue, LabelValue, f64)> {
    let answer = record.answer?;
    let prob = record.prob?;
    is_probability(prob).then_some((answer, record.label, prob))
}

/// Keep the most probable of the top-k answers (first one on ties).
///
/// Skipped when any answer or probability is missing, any probability is
/// outside `[0, 1]`, or the two leading probabilities are both zero.
pub fn from_top_k(record: MultiAnswerRecord) -> Option<(LabelValue, LabelValue, f64)> {
    let answers: Vec<LabelValue> = record.answers.into_iter().collect::<Option<_>>()?;
    let probs: Vec<f64> = record.probs.into_iter().collect::<Option<_>>()?;
    if probs.is_empty() || answers.len() < probs.len() || !probs.iter().all(|p| is_probability(*p)) {
        return None;
    }
    let leading = probs.iter().take(2).any(|p| *p != 0.0);
    if !leading {
        return None;
    }

    let mut best = 0;
    for (i, p) in probs.iter().enumerate() {
        if *p > probs[best] {
            best = i;
        }
    }
    let answer = answers.into_iter().nth(best)?;
    Some((answer, record.label, probs[best]))
}

/// Majority answer among samples; its relative frequency is the confidence.
pub fn from_consistency(record: MultiAnswerRecord) -> Option<(LabelValue, LabelValue, f64)> {
    let answers: Vec<LabelValue> = record.answers.into_iter().collect::<Option<_>>()?;
    if answers.is_empty() {
        return None;
    }

    let mut tally: Vec<(LabelValue, usize)> = Vec::new();
    for answer in answers.iter() {
        match tally.iter_mut().find(|(a, _)| a.same_answer(answer)) {
            Some((_, n)) => *n += 1,
            None => tally.push((answer.clone(), 1)),
        }
    }

    let total = answers.len() as f64;
    let (answer, count) = first_max_by(tally, |(_, n)| *n as f64)?;
    Some((answer, record.label, count as f64 / total))
}

/// Average probability per distinct sampled answer; keep the best answer.
pub fn from_sampled_pairs(record: SampledPairsRecord) -> Option<(LabelValue, LabelValue, f64)> {
    let mut pairs = Vec::with_capacity(record.answers.len());
    for (answer, prob) in record.answers {
        let (answer, prob) = (answer?, prob?);
        if !is_probability(prob) {
            return None;
        }
        pairs.push((answer, prob));
    }

    best_mean_answer(pairs).map(|(answer, score)| (answer, record.label, score))
}

/// Most probable answer of every sampled top-k list, then averaged as in
/// [`from_sampled_pairs`].
pub fn from_sampled_top_k(record: SampledTopKRecord) -> Option<(LabelValue, LabelValue, f64)> {
    let mut pairs = Vec::with_capacity(record.answers.len());
    for (answers, probs) in record.answers {
        let answers: Vec<LabelValue> = answers.into_iter().collect::<Option<_>>()?;
        let probs: Vec<f64> = probs.into_iter().collect::<Option<_>>()?;
        if probs.is_empty() || answers.len() < probs.len() || !probs.iter().all(|p| is_probability(*p)) {
            return None;
        }
        let (best, prob) = first_max_by(probs.into_iter().enumerate().collect(), |(_, p)| *p)?;
        pairs.push((answers.into_iter().nth(best)?, prob));
    }
    best_mean_answer(pairs).map(|(answer, score)| (answer, record.label, score))
}

/// Mean probability per distinct answer; the best mean wins (first seen on ties).
fn best_mean_answer(pairs: Vec<(LabelValue, f64)>) -> Option<(LabelValue, f64)> {
    let mut groups: Vec<(LabelValue, f64, usize)> = Vec::new();
    for (answer, prob) in pairs {
        match groups.iter_mut().find(|(a, _, _)| a.same_answer(&answer)) {
            Some((_, sum, n)) => {
                *sum += prob;
                *n += 1;
            }
            None => groups.push((answer, prob, 1)),
        }
    }

    let scored = groups.into_iter().map(|(a, sum, n)| (a, sum / n as f64));
    first_max_by(scored.collect(), |(_, s)| *s)
}

fn first_max_by<T, F: Fn(&T) -> f64>(items: Vec<T>, key: F) -> Option<T> {
    let mut best: Option<T> = None;
    for item in items {
        let better = match &best {
            Some(b) => key(&item) > key(b),
            None => true,
        };
        if better {
            best = Some(item);
        }
    }
    best
}

/// Extract trials from parsed JSON records.
///
/// `records` are `(line_number, value)` pairs; the line number is used only
/// in error messages.
pub fn extract_trials<'a, I>(source: ConfidenceSource, records: I) -> Result<ExtractedTrials, DmcError>
where
    I: IntoIterator<Item = (usize, &'a Value)>,
{
    let mut out = ExtractedTrials::default();
    for (line, value) in records {
        let extracted = match source {
            ConfidenceSource::Verbal => from_single_answer(decode(line, value)?),
            ConfidenceSource::TopK => from_top_k(decode(line, value)?),
            ConfidenceSource::Consistency => from_consistency(decode(line, value)?),
            ConfidenceSource::VerbalConsistency => from_sampled_pairs(decode(line, value)?),
            ConfidenceSource::VerbalConsistencyTopK => from_sampled_top_k(decode(line, value)?),
        };
        if let Some((answer, label, prob)) = extracted {
            out.push(answer, label, prob);
        }
    }
    Ok(out)
}

fn decode<T: for<'de> Deserialize<'de>>(line: usize, value: &Value) -> Result<T, DmcError> {
    T::deserialize(value).map_err(|e| DmcError::Json(format!("record on line {line}: {e}")))
}

/// Fraction of answers equal to their label, or `None` when there are none.
pub fn accuracy_rate(answers: &[LabelValue], labels: &[LabelValue]) -> Option<f64> {
    if answers.is_empty() {
        return None;
    }
    let correct = answers
        .iter()
        .zip(labels.iter())
        .filter(|(a, l)| a.same_answer(l))
        .count();
    Some(correct as f64 / answers.len() as f64)
}
