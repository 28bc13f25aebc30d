//! Count builder: trial-level observations to a rating-count table.
//!
//! See `RatingCounts` for the canonical cell order. Invalid trials (class not
//! in `{0, 1}` after yes/no normalization, rating outside `1..=n_ratings`) are
//! dropped silently before counting.

use tracing::debug;

use crate::domain::{CountOptions, LabelValue, RatingCounts, Stimulus, Trial};
use crate::error::DmcError;

/// Cell index of a trial in the canonical `2 · n_ratings` layout.
fn cell_index(trial: &Trial, n_ratings: usize) -> usize {
    match trial.response {
        Stimulus::S1 => n_ratings - trial.rating,
        Stimulus::S2 => n_ratings + trial.rating - 1,
    }
}

/// Count already-validated trials (no padding).
///
/// Trials whose rating exceeds `n_ratings` are skipped.
pub fn count_trials(trials: &[Trial], n_ratings: usize) -> Result<RatingCounts, DmcError> {
    if n_ratings < 2 {
        return Err(DmcError::invalid_input("n_ratings must be >= 2."));
    }
    let mut nr_s1 = vec![0.0; 2 * n_ratings];
    let mut nr_s2 = vec![0.0; 2 * n_ratings];

    for trial in trials {
        if trial.rating < 1 || trial.rating > n_ratings {
            continue;
        }
        let idx = cell_index(trial, n_ratings);
        match trial.stimulus {
            Stimulus::S1 => nr_s1[idx] += 1.0,
            Stimulus::S2 => nr_s2[idx] += 1.0,
        }
    }

    RatingCounts::new(nr_s1, nr_s2)
}

/// Convert raw per-trial sequences into response counts.
///
/// `stim_id[i]` / `response[i]`: `0` (or `"no"`) for S1, `1` (or `"yes"`) for S2.
/// `rating[i]` must lie in `1..=n_ratings`. The three sequences must have the
/// same length.
pub fn trials2counts(
    stim_id: &[LabelValue],
    response: &[LabelValue],
    rating: &[i64],
    n_ratings: usize,
    options: CountOptions,
) -> Result<RatingCounts, DmcError> {
    if stim_id.len() != response.len() || stim_id.len() != rating.len() {
        return Err(DmcError::input_shape(format!(
            "stimID, response, and rating must have the same lengths (got {}, {}, {}).",
            stim_id.len(),
            response.len(),
            rating.len()
        )));
    }

    let trials: Vec<Trial> = stim_id
        .iter()
        .zip(response.iter())
        .zip(rating.iter())
        .filter_map(|((s, r), &rt)| {
            Trial::from_codes(s.binary_code()?, r.binary_code()?, rt, n_ratings)
        })
        .collect();

    let dropped = stim_id.len() - trials.len();
    if dropped > 0 {
        debug!(dropped, kept = trials.len(), "dropped invalid trials before counting");
    }

    let counts = count_trials(&trials, n_ratings)?;
    if !options.pad_cells {
        return Ok(counts);
    }

    let pad = options.resolved_pad_amount(n_ratings);
    if !(pad.is_finite() && pad >= 0.0) {
        return Err(DmcError::invalid_input(format!(
            "pad amount must be finite and non-negative, got {pad}."
        )));
    }
    Ok(counts.padded(pad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ints(values: &[i64]) -> Vec<LabelValue> {
        values.iter().map(|&v| LabelValue::Int(v)).collect()
    }

    #[test]
    fn canonical_order_puts_high_confidence_on_the_outside() {
        let counts = trials2counts(
            &ints(&[0, 0, 1, 1]),
            &ints(&[0, 0, 1, 1]),
            &[2, 1, 2, 1],
            2,
            CountOptions::unpadded(),
        )
        .unwrap();
        assert_eq!(counts.nr_s1, vec![1.0, 1.0, 0.0, 0.0]);
        assert_eq!(counts.nr_s2, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn high_confidence_s1_and_s2_responses_land_on_the_outer_cells() {
        // S1 stimulus, "S1" response, rating 2 -> first cell; S2 stimulus,
        // "S2" response, rating 2 -> last cell.
        let counts = trials2counts(
            &ints(&[0, 1]),
            &ints(&[0, 1]),
            &[2, 2],
            2,
            CountOptions::unpadded(),
        )
        .unwrap();
        assert_eq!(counts.nr_s1, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(counts.nr_s2, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn yes_no_labels_are_normalized_and_invalid_trials_dropped() {
        let stim = vec![
            LabelValue::from("yes"),
            LabelValue::from("no"),
            LabelValue::from("maybe"),
            LabelValue::Int(1),
        ];
        let resp = vec![
            LabelValue::from("yes"),
            LabelValue::from("yes"),
            LabelValue::from("no"),
            LabelValue::Int(0),
        ];
        let counts = trials2counts(&stim, &resp, &[1, 2, 1, 7], 2, CountOptions::unpadded()).unwrap();
        // yes/yes rating 1 -> S2 stimulus, "S2" response, rating 1 -> cell 2.
        // no/yes rating 2 -> S1 stimulus, "S2" response, rating 2 -> cell 3.
        assert_eq!(counts.nr_s1, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(counts.nr_s2, vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn padding_adds_default_amount_to_every_cell() {
        let counts = trials2counts(
            &ints(&[0, 1]),
            &ints(&[0, 1]),
            &[1, 1],
            4,
            CountOptions::default(),
        )
        .unwrap();
        assert!(counts.nr_s1.iter().chain(counts.nr_s2.iter()).all(|v| *v >= 0.125));
        assert!((counts.nr_s1[3] - 1.125).abs() < 1e-12);
        assert!((counts.nr_s2[4] - 1.125).abs() < 1e-12);
    }

    #[test]
    fn mismatched_lengths_are_a_shape_error() {
        let err = trials2counts(&ints(&[0, 1]), &ints(&[0]), &[1, 1], 2, CountOptions::unpadded());
        assert!(matches!(err, Err(DmcError::InputShape(_))));
    }

    proptest! {
        #[test]
        fn counts_have_canonical_length_and_ignore_bad_ratings(
            trials in prop::collection::vec((0i64..2, 0i64..2, 1i64..=4), 0..80),
            bad in prop::collection::vec((0i64..2, 0i64..2, prop_oneof![-3i64..=0, 5i64..9]), 0..20),
            pad in any::<bool>(),
        ) {
            let options = if pad { CountOptions::default() } else { CountOptions::unpadded() };
            let build = |rows: &[(i64, i64, i64)]| {
                let stim: Vec<LabelValue> = rows.iter().map(|r| LabelValue::Int(r.0)).collect();
                let resp: Vec<LabelValue> = rows.iter().map(|r| LabelValue::Int(r.1)).collect();
                let rating: Vec<i64> = rows.iter().map(|r| r.2).collect();
                trials2counts(&stim, &resp, &rating, 4, options).unwrap()
            };

            let clean = build(&trials);
            prop_assert_eq!(clean.nr_s1.len(), 8);
            prop_assert_eq!(clean.nr_s2.len(), 8);
            let floor = if pad { 0.125 } else { 0.0 };
            prop_assert!(clean.nr_s1.iter().chain(clean.nr_s2.iter()).all(|v| *v >= floor));

            let mut mixed = trials.clone();
            mixed.extend(bad.iter().copied());
            prop_assert_eq!(build(&mixed), clean.clone());
            prop_assert_eq!(build(&trials), clean);
        }
    }
}
