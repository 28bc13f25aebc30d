//! Confidence discretization: continuous scores in `[0, 1]` to ordinal ratings.
//!
//! Equal-width binning cuts the observed `[min, max]` range into `num_bins`
//! right-closed intervals. The lowest edge is pulled down by 0.1% of the range
//! so the minimum itself falls into bin 1. A constant input is widened by
//! ±0.1% of its magnitude (±0.001 around zero) before cutting.

use crate::domain::DiscretizeKind;
use crate::error::DmcError;

/// Stateless rating discretizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discretizer;

impl Discretizer {
    /// Bin `data` into labels `1..=num_bins`, preserving length and order.
    pub fn apply(&self, num_bins: usize, data: &[f64], kind: DiscretizeKind) -> Result<Vec<usize>, DmcError> {
        if num_bins == 0 {
            return Err(DmcError::invalid_input("num_bins must be > 0."));
        }
        if data.is_empty() {
            return Err(DmcError::invalid_input("cannot discretize an empty sequence."));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(DmcError::invalid_input("confidence values must be finite."));
        }

        match kind {
            DiscretizeKind::EqualWidth => {
                let edges = equal_width_edges(num_bins, data);
                Ok(data.iter().map(|&v| bin_label(&edges, v)).collect())
            }
        }
    }
}

/// `num_bins + 1` edges covering the observed range of `data`.
pub fn equal_width_edges(num_bins: usize, data: &[f64]) -> Vec<f64> {
    let mut lo = data.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if lo == hi {
        let pad = if lo != 0.0 { 0.001 * lo.abs() } else { 0.001 };
        lo -= pad;
        hi += pad;
        return linspace(lo, hi, num_bins + 1);
    }

    let mut edges = linspace(lo, hi, num_bins + 1);
    edges[0] -= (hi - lo) * 0.001;
    edges
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / (n as f64 - 1.0);
    let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    if let Some(last) = out.last_mut() {
        *last = stop;
    }
    out
}

/// 1-based index of the right-closed interval containing `v`.
fn bin_label(edges: &[f64], v: f64) -> usize {
    let idx = edges.partition_point(|&e| e < v);
    idx.clamp(1, edges.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn four_bins_on_spread_values() {
        let labels = Discretizer
            .apply(4, &[0.1, 0.3, 0.6, 0.9], DiscretizeKind::EqualWidth)
            .unwrap();
        assert_eq!(labels, vec![1, 1, 3, 4]);
    }

    #[test]
    fn minimum_lands_in_first_bin_and_maximum_in_last() {
        let labels = Discretizer
            .apply(3, &[0.5, 0.2, 0.8, 0.2], DiscretizeKind::EqualWidth)
            .unwrap();
        assert_eq!(labels, vec![2, 1, 3, 1]);
    }

    #[test]
    fn constant_input_uses_the_middle_bins() {
        let labels = Discretizer
            .apply(4, &[0.7, 0.7, 0.7], DiscretizeKind::EqualWidth)
            .unwrap();
        // The widened range is symmetric, so the value sits on the middle edge.
        assert!(labels.iter().all(|&l| l == labels[0]));
        assert!(labels[0] == 2 || labels[0] == 3);
        let zeros = Discretizer.apply(2, &[0.0, 0.0], DiscretizeKind::EqualWidth).unwrap();
        assert_eq!(zeros, vec![1, 1]);
    }

    #[test]
    fn rejects_empty_or_non_finite_input() {
        assert!(Discretizer.apply(4, &[], DiscretizeKind::EqualWidth).is_err());
        assert!(Discretizer.apply(4, &[0.1, f64::NAN], DiscretizeKind::EqualWidth).is_err());
        assert!(Discretizer.apply(0, &[0.1], DiscretizeKind::EqualWidth).is_err());
    }

    proptest! {
        #[test]
        fn labels_are_in_range_and_monotone(
            data in prop::collection::vec(0.0f64..=1.0, 1..64),
            num_bins in 1usize..10,
        ) {
            let labels = Discretizer.apply(num_bins, &data, DiscretizeKind::EqualWidth).unwrap();
            prop_assert_eq!(labels.len(), data.len());
            prop_assert!(labels.iter().all(|&l| l >= 1 && l <= num_bins));

            let mut pairs: Vec<(f64, usize)> = data.iter().copied().zip(labels.iter().copied()).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            for w in pairs.windows(2) {
                prop_assert!(w[0].1 <= w[1].1);
            }
        }
    }
}
