//! NaN-aware summary statistics for flux arrays

use crate::{LightCurveError, Result};

fn non_nan_sorted(values: &[f64]) -> Vec<f64> {
    let mut valid: Vec<f64> = values.iter().filter(|v| !v.is_nan()).copied().collect();
    valid.sort_by(|a, b| a.total_cmp(b));
    valid
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Median of the non-NaN values; ±inf take part in the ordering.
///
/// Errors with `NoValidData` when every value is NaN (or there are none).
pub fn median(values: &[f64]) -> Result<f64> {
    let valid = non_nan_sorted(values);
    if valid.is_empty() {
        return Err(LightCurveError::NoValidData {
            what: "median",
            total: values.len(),
        });
    }
    Ok(median_of_sorted(&valid))
}

/// Median ignoring NaN, returning NaN when nothing is left.
pub fn nanmedian(values: &[f64]) -> f64 {
    median(values).unwrap_or(f64::NAN)
}

/// Mean ignoring NaN, returning NaN when nothing is left.
pub fn nanmean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation ignoring NaN.
pub fn nanstd(values: &[f64]) -> f64 {
    let mean = nanmean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sum_sq, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + (v - mean).powi(2), c + 1));
    (sum_sq / count as f64).sqrt()
}

/// Median absolute deviation about the median, ignoring NaN.
pub fn mad(values: &[f64]) -> f64 {
    let med = nanmedian(values);
    if med.is_nan() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| (v - med).abs())
        .collect();
    nanmedian(&deviations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_of_flux_samples() {
        assert_eq!(median(&[1.02, 0.98, 1.00, 0.97, 1.01]).unwrap(), 1.00);
        assert_relative_eq!(median(&[1500.0, 1510.0, 1490.0, 1520.0]).unwrap(), 1505.0);
    }

    #[test]
    fn test_median_skips_gaps() {
        let flux = [0.99, f64::NAN, 1.01, f64::NAN, 1.00];
        assert_eq!(median(&flux).unwrap(), 1.00);
        assert_eq!(nanmedian(&flux), 1.00);
    }

    #[test]
    fn test_median_orders_infinities() {
        assert_eq!(median(&[f64::INFINITY, 0.5, f64::NEG_INFINITY]).unwrap(), 0.5);
    }

    #[test]
    fn test_median_without_data() {
        let gap = [f64::NAN; 4];
        let err = median(&gap).unwrap_err();
        assert!(err.to_string().contains("4 total values"));
        assert!(nanmedian(&gap).is_nan());
        assert!(matches!(
            median(&[]),
            Err(LightCurveError::NoValidData { total: 0, .. })
        ));
    }

    #[test]
    fn test_nanmean_and_nanstd() {
        let values = vec![2.0, 4.0, f64::NAN, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(nanmean(&values), 5.0);
        assert_relative_eq!(nanstd(&values), 2.0);
    }

    #[test]
    fn test_nanstd_empty() {
        assert!(nanstd(&[]).is_nan());
        assert!(nanmean(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_mad() {
        let values = vec![1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        assert_relative_eq!(mad(&values), 1.0);
    }
}
