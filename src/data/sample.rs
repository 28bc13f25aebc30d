//! Synthetic rating data from an equal-variance Gaussian observer.
//!
//! Useful for checking the fitter against a known ground truth:
//! - `simulate_trials` draws individual trials with a seeded RNG
//! - `expected_counts` returns the exact expected count table

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{RatingCounts, Stimulus, Trial};
use crate::error::DmcError;
use crate::math::{Link, StandardNormal};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub n_trials: usize,
    /// Distance between the S1 and S2 evidence means.
    pub d_prime: f64,
    /// `2 · n_ratings - 1` ascending criteria; the middle one is the type-1 criterion.
    pub criteria: Vec<f64>,
    /// Extra noise on the evidence used for the confidence rating only.
    /// Zero gives an ideal metacognitive observer.
    pub confidence_noise: f64,
    pub seed: u64,
}

fn validate_criteria(criteria: &[f64]) -> Result<usize, DmcError> {
    if criteria.len() < 3 || criteria.len() % 2 == 0 {
        return Err(DmcError::invalid_input(format!(
            "need an odd number (>= 3) of criteria, got {}.",
            criteria.len()
        )));
    }
    if criteria.iter().any(|c| !c.is_finite()) || criteria.windows(2).any(|w| w[0] >= w[1]) {
        return Err(DmcError::invalid_input("criteria must be finite and strictly increasing."));
    }
    Ok(criteria.len().div_ceil(2))
}

/// Draw trials: stimulus with probability 1/2 each, evidence ~ N(±d′/2, 1).
pub fn simulate_trials(config: &SimulationConfig) -> Result<Vec<Trial>, DmcError> {
    let n_ratings = validate_criteria(&config.criteria)?;
    if !config.d_prime.is_finite() {
        return Err(DmcError::invalid_input("d_prime must be finite."));
    }
    if !(config.confidence_noise.is_finite() && config.confidence_noise >= 0.0) {
        return Err(DmcError::invalid_input("confidence_noise must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| DmcError::invalid_input(format!("noise distribution error: {e}")))?;

    let (lower, rest) = config.criteria.split_at(n_ratings - 1);
    let (t1, upper) = (rest[0], &rest[1..]);

    let mut trials = Vec::with_capacity(config.n_trials);
    for _ in 0..config.n_trials {
        let stimulus = if rng.gen_bool(0.5) { Stimulus::S2 } else { Stimulus::S1 };
        let mean = match stimulus {
            Stimulus::S1 => -0.5 * config.d_prime,
            Stimulus::S2 => 0.5 * config.d_prime,
        };
        let evidence = mean + normal.sample(&mut rng);
        let rated = evidence + config.confidence_noise * normal.sample(&mut rng);

        let (response, rating) = if evidence <= t1 {
            (Stimulus::S1, 1 + lower.iter().filter(|&&c| rated <= c).count())
        } else {
            (Stimulus::S2, 1 + upper.iter().filter(|&&c| rated > c).count())
        };
        trials.push(Trial {
            stimulus,
            response,
            rating,
        });
    }
    Ok(trials)
}

/// Expected count table for `total` trials split evenly between S1 and S2.
///
/// Bins between consecutive criteria, read from low to high evidence, are
/// exactly the canonical cell order of `RatingCounts`.
pub fn expected_counts(d_prime: f64, criteria: &[f64], total: f64) -> Result<RatingCounts, DmcError> {
    validate_criteria(criteria)?;
    if !(total.is_finite() && total > 0.0) {
        return Err(DmcError::invalid_input("total must be finite and > 0."));
    }

    let link = StandardNormal;
    let mut edges = Vec::with_capacity(criteria.len() + 2);
    edges.push(f64::NEG_INFINITY);
    edges.extend_from_slice(criteria);
    edges.push(f64::INFINITY);

    let per_class = 0.5 * total;
    let masses = |mean: f64| -> Vec<f64> {
        edges
            .windows(2)
            .map(|w| per_class * (link.cdf(w[1], mean, 1.0) - link.cdf(w[0], mean, 1.0)))
            .collect()
    };

    RatingCounts::new(masses(-0.5 * d_prime), masses(0.5 * d_prime))
}
