//! Bounds and linear ordering rows for the meta-d′ parameter vector.

use nalgebra::{DMatrix, DVector};

use crate::optim::{Bounds, LinearConstraints};

/// meta-d′ in `[0, d1]`; lower criteria in `[-bound, 0]`; upper in `[0, bound]`.
pub fn parameter_bounds(n_ratings: usize, d1: f64, bound: f64) -> Bounds {
    let half = n_ratings - 1;
    let mut lower = vec![0.0];
    let mut upper = vec![d1];
    lower.extend(std::iter::repeat_n(-bound, half));
    upper.extend(std::iter::repeat_n(0.0, half));
    lower.extend(std::iter::repeat_n(0.0, half));
    upper.extend(std::iter::repeat_n(bound, half));
    Bounds {
        lower: DVector::from_vec(lower),
        upper: DVector::from_vec(upper),
    }
}

/// Ordering rows, all of the form `a · x <= -gap`:
///
/// - adjacent criteria on each side are at least `gap` apart
/// - the innermost lower criterion is at most `-gap`
/// - the innermost upper criterion is at least `gap`
pub fn criterion_rows(n_ratings: usize, gap: f64) -> LinearConstraints {
    let dim = 2 * n_ratings - 1;
    let rows = 2 * n_ratings - 2;
    let mut a = DMatrix::<f64>::zeros(rows, dim);
    let mut r = 0;

    for k in 1..n_ratings - 1 {
        a[(r, k)] = 1.0;
        a[(r, k + 1)] = -1.0;
        r += 1;
    }
    a[(r, n_ratings - 1)] = 1.0;
    r += 1;
    a[(r, n_ratings)] = -1.0;
    r += 1;
    for k in n_ratings..dim - 1 {
        a[(r, k)] = 1.0;
        a[(r, k + 1)] = -1.0;
        r += 1;
    }
    debug_assert_eq!(r, rows);

    LinearConstraints {
        a,
        upper: DVector::from_element(rows, -gap),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_split_criteria_around_zero() {
        let b = parameter_bounds(3, 1.4, 20.0);
        assert_eq!(b.lower.as_slice(), &[0.0, -20.0, -20.0, 0.0, 0.0]);
        assert_eq!(b.upper.as_slice(), &[1.4, 0.0, 0.0, 20.0, 20.0]);
    }

    #[test]
    fn rows_accept_well_separated_criteria_only() {
        let lin = criterion_rows(3, 0.05);
        assert_eq!(lin.a.nrows(), 4);
        let ok = DVector::from_row_slice(&[1.0, -1.0, -0.5, 0.5, 1.0]);
        let slack = &lin.upper - &lin.a * &ok;
        assert!(slack.iter().all(|s| *s > 0.0));

        let crowded = DVector::from_row_slice(&[1.0, -1.0, -0.02, 0.5, 1.0]);
        let slack = &lin.upper - &lin.a * &crowded;
        assert!(slack.iter().any(|s| *s < 0.0));
    }

    #[test]
    fn two_ratings_only_pin_the_innermost_criteria() {
        let lin = criterion_rows(2, 0.05);
        assert_eq!(lin.a, DMatrix::from_row_slice(2, 3, &[0.0, 1.0, 0.0, 0.0, 0.0, -1.0]));
    }
}
