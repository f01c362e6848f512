//! Linear interpolation for filling masked samples.

use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug)]
pub enum InterpError {
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
}

fn validate(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    if xs.windows(2).any(|w| w[1] < w[0]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Linear interpolation between the bracketing pair, found by binary search.
fn interp_unchecked(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    // partition_point returns the index of the first element > x
    let idx = xs.partition_point(|&val| val <= x);
    if idx == 0 {
        return ys[0];
    }
    if idx == xs.len() {
        return ys[xs.len() - 1];
    }

    let (x1, x2) = (xs[idx - 1], xs[idx]);
    let (y1, y2) = (ys[idx - 1], ys[idx]);
    if x2 == x1 {
        return y1;
    }
    let t = (x - x1) / (x2 - x1);
    y1 + t * (y2 - y1)
}

/// Interpolate at every point of `x`, holding the end values outside the range.
///
/// A single known point yields a constant.
pub fn interp_clamped(x: &[f64], xs: &[f64], ys: &[f64]) -> Result<Vec<f64>, InterpError> {
    if xs.len() == 1 && ys.len() == 1 {
        return Ok(vec![ys[0]; x.len()]);
    }
    validate(xs, ys)?;
    Ok(x.iter().map(|&v| interp_unchecked(v, xs, ys)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let out = interp_clamped(&[2.0], &[1.0, 2.0, 3.0, 4.0], &[10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_eq!(out, vec![20.0]);
    }

    #[test]
    fn test_unsorted_and_mismatched() {
        assert!(matches!(
            interp_clamped(&[1.5], &[2.0, 1.0, 3.0], &[1.0, 2.0, 3.0]),
            Err(InterpError::UnsortedData)
        ));
        assert!(matches!(
            interp_clamped(&[1.5], &[1.0, 2.0], &[1.0]),
            Err(InterpError::MismatchedLengths)
        ));
        assert!(matches!(
            interp_clamped(&[1.5], &[], &[]),
            Err(InterpError::InsufficientData)
        ));
    }

    #[test]
    fn test_clamped_holds_ends() {
        let xs = [1.0, 2.0, 4.0];
        let ys = [10.0, 20.0, 40.0];
        let out = interp_clamped(&[0.0, 1.5, 3.0, 9.0], &xs, &ys).unwrap();
        assert_eq!(out, vec![10.0, 15.0, 30.0, 40.0]);
    }

    #[test]
    fn test_clamped_single_point() {
        let out = interp_clamped(&[0.0, 5.0], &[1.0], &[7.0]).unwrap();
        assert_eq!(out, vec![7.0, 7.0]);
    }

    #[test]
    fn test_clamped_duplicate_abscissa() {
        let out = interp_clamped(&[2.0], &[1.0, 2.0, 2.0, 3.0], &[1.0, 2.0, 5.0, 6.0]).unwrap();
        assert!(out[0] == 2.0 || out[0] == 5.0);
    }
}
