//! Trial period and duration grids.

use crate::{Result, TransitError};

/// Shortest duration guess in days.
pub const MIN_DURATION: f64 = 0.005;
/// Longest duration guess in days.
pub const MAX_DURATION: f64 = 0.5;

/// `n` evenly spaced periods from `min` to `max` inclusive.
pub fn linear_period_grid(min: f64, max: f64, n: usize) -> Result<Vec<f64>> {
    if !(min > 0.0) || !min.is_finite() {
        return Err(TransitError::InvalidPeriodGrid(format!(
            "min_period must be positive, got {min}"
        )));
    }
    if !(max > min) || !max.is_finite() {
        return Err(TransitError::InvalidPeriodGrid(format!(
            "max_period {max} must exceed min_period {min}"
        )));
    }
    if n < 2 {
        return Err(TransitError::InvalidPeriodGrid(format!(
            "need at least 2 periods, got {n}"
        )));
    }
    let step = (max - min) / (n - 1) as f64;
    let mut grid: Vec<f64> = (0..n).map(|i| min + step * i as f64).collect();
    grid[n - 1] = max;
    Ok(grid)
}

/// Per-period duration guess: `fraction * period` clamped to
/// [`MIN_DURATION`, `MAX_DURATION`].
pub fn period_to_duration_guess(periods: &[f64], fraction: f64) -> Vec<f64> {
    periods
        .iter()
        .map(|p| (fraction * p).clamp(MIN_DURATION, MAX_DURATION))
        .collect()
}

/// `n` log-spaced trial durations spanning the per-period guesses.
///
/// A single duration is returned when all guesses coincide or `n` is 1.
pub fn duration_grid(periods: &[f64], fraction: f64, n: usize) -> Vec<f64> {
    let guesses = period_to_duration_guess(periods, fraction);
    let lo = guesses.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = guesses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() {
        return Vec::new();
    }
    if n <= 1 || hi <= lo {
        return vec![lo];
    }
    let (log_lo, log_hi) = (lo.ln(), hi.ln());
    let step = (log_hi - log_lo) / (n - 1) as f64;
    let mut grid: Vec<f64> = (0..n).map(|i| (log_lo + step * i as f64).exp()).collect();
    grid[0] = lo;
    grid[n - 1] = hi;
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_default_grid_endpoints() {
        let grid = linear_period_grid(0.5, 10.0, 20000).unwrap();
        assert_eq!(grid.len(), 20000);
        assert_eq!(grid[0], 0.5);
        assert_eq!(grid[19999], 10.0);
        assert_relative_eq!(grid[1] - grid[0], 9.5 / 19999.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_grids() {
        for (min, max, n) in [(0.0, 1.0, 10), (-1.0, 1.0, 10), (2.0, 1.0, 10), (1.0, 1.0, 10), (1.0, 2.0, 1)] {
            assert!(matches!(
                linear_period_grid(min, max, n),
                Err(TransitError::InvalidPeriodGrid(_))
            ));
        }
        assert!(linear_period_grid(f64::NAN, 2.0, 10).is_err());
    }

    #[test]
    fn test_duration_guess_clamped() {
        let guesses = period_to_duration_guess(&[0.05, 1.0, 20.0], 0.05);
        assert_eq!(guesses, vec![0.005, 0.05, 0.5]);
    }

    #[test]
    fn test_duration_grid_log_spaced() {
        let periods = linear_period_grid(0.5, 10.0, 100).unwrap();
        let grid = duration_grid(&periods, 0.05, 3);
        assert_eq!(grid.len(), 3);
        assert_relative_eq!(grid[0], 0.025, epsilon = 1e-12);
        assert_relative_eq!(grid[2], 0.5, epsilon = 1e-12);
        assert_relative_eq!(grid[1], (0.025f64 * 0.5).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_duration_grid_degenerate() {
        assert_eq!(duration_grid(&[20.0, 30.0], 0.05, 8), vec![0.5]);
        assert!(duration_grid(&[], 0.05, 8).is_empty());
    }

    proptest! {
        #[test]
        fn grid_is_increasing(min in 0.01f64..5.0, span in 0.01f64..50.0, n in 2usize..500) {
            let grid = linear_period_grid(min, min + span, n).unwrap();
            prop_assert_eq!(grid.len(), n);
            prop_assert!(grid.windows(2).all(|w| w[1] > w[0]));
        }

        #[test]
        fn durations_stay_in_bounds(periods in proptest::collection::vec(0.01f64..100.0, 1..50), n in 1usize..12) {
            for d in duration_grid(&periods, 0.05, n) {
                prop_assert!((MIN_DURATION..=MAX_DURATION).contains(&d));
            }
        }
    }
}
