//! Type-1 estimates and the starting point for the meta-d′ search.

use nalgebra::DVector;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::domain::{ConstantCriterion, RatingCounts};
use crate::math::Link;

/// Criteria are kept this far inside their gap constraints at the start,
/// relative to the minimum gap.
const START_GAP_FACTOR: f64 = 1.2;

/// Type-1 SDT estimates from cumulative hit / false-alarm rates.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeOne {
    /// Cumulative hit rates at each of the `2n - 1` cut-points.
    pub hit_rates: Vec<f64>,
    /// Cumulative false-alarm rates at each cut-point.
    pub false_alarm_rates: Vec<f64>,
    pub d1: f64,
    pub t1c1: f64,
    /// Criteria at every cut-point except the central one (native units).
    pub t2c1: Vec<f64>,
}

impl TypeOne {
    pub fn estimate<L: Link + ?Sized>(link: &L, counts: &RatingCounts, s: f64) -> Self {
        let n = counts.n_ratings();
        let total_s1: f64 = counts.nr_s1.iter().sum();
        let total_s2: f64 = counts.nr_s2.iter().sum();

        let hit_rates: Vec<f64> = (1..2 * n)
            .map(|c| counts.nr_s2[c..].iter().sum::<f64>() / total_s2)
            .collect();
        let false_alarm_rates: Vec<f64> = (1..2 * n)
            .map(|c| counts.nr_s1[c..].iter().sum::<f64>() / total_s1)
            .collect();

        let t1_index = n - 1;
        let z_hit: Vec<f64> = hit_rates.iter().map(|p| link.inverse_cdf(*p)).collect();
        let z_fa: Vec<f64> = false_alarm_rates.iter().map(|p| link.inverse_cdf(*p)).collect();

        let d1 = (1.0 / s) * (z_hit[t1_index] - z_fa[t1_index]);
        let c1: Vec<f64> = z_hit
            .iter()
            .zip(z_fa.iter())
            .map(|(h, f)| (-1.0 / (1.0 + s)) * (h + f))
            .collect();
        let t1c1 = c1[t1_index];
        let t2c1 = c1
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != t1_index)
            .map(|(_, c)| *c)
            .collect();

        Self {
            hit_rates,
            false_alarm_rates,
            d1,
            t1c1,
            t2c1,
        }
    }

    /// Whether the optimizer can run at all: meta-d′ is searched in `[0, d1]`.
    pub fn is_usable(&self) -> bool {
        self.d1.is_finite() && self.d1 > 0.0 && self.t1c1.is_finite()
    }
}

/// Seed for the initial meta-d′ draw when none is configured.
pub fn seed_from_beta(beta: f64) -> u64 {
    beta.to_bits()
}

/// Initial meta-d′ drawn uniformly from `[0, d1]`.
pub fn seed_meta_d(d1: f64, seed: u64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let u: f64 = rng.r#gen();
    u * d1
}

/// Starting point strictly inside bounds and linear rows.
///
/// meta-d′ is pulled into `[0.01, 0.99] · d1`; each criterion side is pushed
/// away from the type-1 criterion and apart from its neighbours, falling
/// back to evenly spaced criteria when that would leave the bounds.
pub fn initial_guess(
    one: &TypeOne,
    meta_d: f64,
    criterion: ConstantCriterion,
    min_gap: f64,
    bound: f64,
) -> DVector<f64> {
    let meta_d = if one.d1 > 0.0 {
        meta_d.clamp(0.01 * one.d1, 0.99 * one.d1)
    } else {
        0.0
    };
    let cc = if one.is_usable() {
        criterion.offset(meta_d, one.t1c1, one.d1)
    } else {
        0.0
    };

    let half = one.t2c1.len() / 2;
    let shifted: Vec<f64> = one.t2c1.iter().map(|c| c - cc).collect();
    let gap = START_GAP_FACTOR * min_gap;
    let lower = repair_lower(&shifted[..half], gap, bound);
    let upper = repair_upper(&shifted[half..], gap, bound);

    let mut x = Vec::with_capacity(1 + 2 * half);
    x.push(meta_d);
    x.extend(lower);
    x.extend(upper);
    DVector::from_vec(x)
}

fn repair_lower(raw: &[f64], gap: f64, bound: f64) -> Vec<f64> {
    let limit = 0.99 * bound;
    if raw.iter().any(|c| !c.is_finite()) {
        return evenly_spaced_lower(raw.len(), gap, bound);
    }
    let mut c: Vec<f64> = raw.iter().map(|v| v.max(-limit)).collect();
    let Some(last) = c.last_mut() else {
        return c;
    };
    *last = last.min(-gap);
    for k in (0..c.len() - 1).rev() {
        c[k] = c[k].min(c[k + 1] - gap);
    }
    if c[0] <= -limit {
        return evenly_spaced_lower(raw.len(), gap, bound);
    }
    c
}

fn repair_upper(raw: &[f64], gap: f64, bound: f64) -> Vec<f64> {
    let mirrored: Vec<f64> = raw.iter().rev().map(|v| -v).collect();
    repair_lower(&mirrored, gap, bound)
        .into_iter()
        .rev()
        .map(|v| -v)
        .collect()
}

/// `m` ascending criteria from `-0.95 · bound` up to `-gap`.
fn evenly_spaced_lower(m: usize, gap: f64, bound: f64) -> Vec<f64> {
    if m == 1 {
        return vec![-gap];
    }
    let start = -0.95 * bound;
    let step = (-gap - start) / (m as f64 - 1.0);
    (0..m).map(|i| start + step * i as f64).collect()
}
