//! NaN removal, outlier clipping and normalisation.

use crate::config::CleanConfig;
use crate::{Result, TransitError};
use lightcurve::stats::{nanmedian, nanstd};
use lightcurve::LightCurve;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Sample counts after each cleaning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub initial: usize,
    pub after_nans: usize,
    pub after_outliers: usize,
}

/// Iterative sigma clipping about the median.
///
/// Each pass computes the median and population standard deviation of the
/// surviving values and clips anything further than `sigma` standard
/// deviations away. Stops once a pass clips nothing or after `maxiters`
/// passes. Returns a mask that is `true` for clipped values; NaN counts as
/// clipped.
///
/// # Errors
/// [`TransitError::InvalidStatistics`] when the median or deviation of the
/// surviving values is not finite, e.g. no finite input at all.
pub fn sigma_clip(values: &[f64], sigma: f64, maxiters: usize) -> Result<Vec<bool>> {
    let mut clipped: Vec<bool> = values.iter().map(|v| !v.is_finite()).collect();

    for _ in 0..maxiters.max(1) {
        let kept: Vec<f64> = values
            .iter()
            .zip(&clipped)
            .filter(|(_, &c)| !c)
            .map(|(&v, _)| v)
            .collect();

        let center = nanmedian(&kept);
        let std = nanstd(&kept);
        if !center.is_finite() || !std.is_finite() {
            return Err(TransitError::InvalidStatistics { center, std });
        }

        let mut changed = 0;
        for (v, c) in values.iter().zip(clipped.iter_mut()) {
            if !*c && (v - center).abs() > sigma * std {
                *c = true;
                changed += 1;
            }
        }
        if changed == 0 {
            break;
        }
    }

    Ok(clipped)
}

/// Single pass `|flux - median| < sigma * std` selection.
fn one_pass_keep(values: &[f64], sigma: f64) -> Vec<bool> {
    let center = nanmedian(values);
    let std = nanstd(values);
    values
        .iter()
        .map(|v| (v - center).abs() < sigma * std)
        .collect()
}

/// Remove NaNs, clip outliers and optionally normalise.
///
/// If iterative clipping fails, a single pass about the median is used
/// instead.
///
/// # Arguments
/// * `lc` - Raw light curve, in any time order
/// * `config` - Clipping threshold, iteration cap and whether to normalise
///
/// # Returns
/// * `Ok((LightCurve, CleanReport))` - The cleaned curve and the point count
///   after each step
/// * `Err(InvalidNormalization)` - Normalisation requested but the median
///   flux is zero or not finite
///
/// # Examples
///
/// ```rust
/// use lightcurve::LightCurve;
/// use transit::{clean_lightcurve, CleanConfig};
///
/// let lc = LightCurve::from_time_flux(
///     vec![0.0, 1.0, 2.0, 3.0],
///     vec![200.0, f64::NAN, 202.0, 198.0],
/// )
/// .unwrap();
/// let (clean, report) = clean_lightcurve(&lc, &CleanConfig::default()).unwrap();
/// assert_eq!(report.after_nans, 3);
/// assert_eq!(clean.flux[0], 1.0);
/// ```
pub fn clean_lightcurve(lc: &LightCurve, config: &CleanConfig) -> Result<(LightCurve, CleanReport)> {
    let initial = lc.len();
    info!("Initial points: {initial}");

    let lc = lc.remove_nans();
    let after_nans = lc.len();
    info!("After remove_nans: {after_nans} points");

    let flux = lc.flux.to_vec();
    let keep: Vec<bool> = match sigma_clip(&flux, config.sigma, config.maxiters) {
        Ok(clipped) => clipped.iter().map(|c| !c).collect(),
        Err(e) => {
            warn!("Sigma clipping failed ({e}); using a single median/std pass");
            one_pass_keep(&flux, config.sigma)
        }
    };
    let lc = lc.select(&keep)?;
    let after_outliers = lc.len();
    info!("After outlier removal: {after_outliers} points");

    let lc = if config.normalize {
        let lc = lc.normalize()?;
        info!("Normalized lightcurve");
        lc
    } else {
        lc
    };

    Ok((
        lc,
        CleanReport {
            initial,
            after_nans,
            after_outliers,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use test_helpers::{generate_transit_series, SyntheticTransitConfig};

    #[test]
    fn test_clip_single_outlier() {
        let mut values: Vec<f64> = (0..100).map(|i| 1.0 + 0.001 * ((i % 7) as f64 - 3.0)).collect();
        values[40] = 2.0;
        let clipped = sigma_clip(&values, 5.0, 5).unwrap();
        assert!(clipped[40]);
        assert_eq!(clipped.iter().filter(|&&c| c).count(), 1);
    }

    #[test]
    fn test_nan_counts_as_clipped() {
        let values = [1.0, f64::NAN, 1.0, 1.0];
        let clipped = sigma_clip(&values, 3.0, 5).unwrap();
        assert_eq!(clipped, vec![false, true, false, false]);
    }

    #[test]
    fn test_all_nan_is_error() {
        let values = [f64::NAN; 5];
        assert!(matches!(
            sigma_clip(&values, 3.0, 5),
            Err(TransitError::InvalidStatistics { .. })
        ));
    }

    #[test]
    fn test_constant_values_survive() {
        let values = [3.0; 10];
        let clipped = sigma_clip(&values, 5.0, 5).unwrap();
        assert!(clipped.iter().all(|&c| !c));
    }

    #[test]
    fn test_clean_removes_injected_outliers() {
        let config = SyntheticTransitConfig {
            baseline_flux: 1500.0,
            noise_std: 0.001,
            outliers: 5,
            nan_fraction: 0.02,
            ..Default::default()
        };
        let series = generate_transit_series(&config);
        let lc = LightCurve::from_time_flux(series.time.clone(), series.flux.clone()).unwrap();

        let (clean, report) = clean_lightcurve(&lc, &CleanConfig::default()).unwrap();
        assert_eq!(report.initial, series.len());
        assert!(report.after_nans < report.initial);
        assert!(report.after_outliers <= report.after_nans - 5);
        assert_eq!(clean.len(), report.after_outliers);

        let median = nanmedian(&clean.flux.to_vec());
        assert_relative_eq!(median, 1.0, epsilon = 1e-3);
        assert!(clean.flux.iter().all(|f| *f < 1.1));
    }

    #[test]
    fn test_clean_without_normalize_keeps_scale() {
        let lc = LightCurve::from_time_flux(vec![0.0, 1.0, 2.0], vec![10.0, 10.0, 10.0]).unwrap();
        let config = CleanConfig {
            normalize: false,
            ..Default::default()
        };
        let (clean, _) = clean_lightcurve(&lc, &config).unwrap();
        assert_eq!(clean.flux.to_vec(), vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_clean_all_nan_fails() {
        let lc = LightCurve::from_time_flux(vec![0.0, 1.0], vec![f64::NAN, f64::NAN]).unwrap();
        assert!(clean_lightcurve(&lc, &CleanConfig::default()).is_err());
    }

    fn flux_with_gaps() -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(
            proptest::option::weighted(0.9, -100.0f64..100.0),
            2..200,
        )
        .prop_map(|v| v.into_iter().map(|f| f.unwrap_or(f64::NAN)).collect())
    }

    proptest! {
        #[test]
        fn gaps_are_always_clipped(values in flux_with_gaps(), sigma in 1.0f64..6.0) {
            prop_assume!(values.iter().any(|v| v.is_finite()));
            let clipped = sigma_clip(&values, sigma, 5).unwrap();
            for (v, c) in values.iter().zip(&clipped) {
                if v.is_nan() {
                    prop_assert!(*c);
                }
            }
        }

        #[test]
        fn survivors_within_bounds_once_converged(values in flux_with_gaps(), sigma in 1.0f64..6.0) {
            prop_assume!(values.iter().any(|v| v.is_finite()));
            // every pass that changes anything clips at least one value
            let clipped = sigma_clip(&values, sigma, values.len() + 1).unwrap();
            let survivors: Vec<f64> = values
                .iter()
                .zip(&clipped)
                .filter(|(_, &c)| !c)
                .map(|(&v, _)| v)
                .collect();
            prop_assert!(!survivors.is_empty());
            let center = nanmedian(&survivors);
            let std = nanstd(&survivors);
            for v in &survivors {
                prop_assert!((v - center).abs() <= sigma * std);
            }
        }

        #[test]
        fn more_passes_never_unclip(values in flux_with_gaps(), sigma in 1.0f64..6.0) {
            prop_assume!(values.iter().any(|v| v.is_finite()));
            let mut previous = sigma_clip(&values, sigma, 1).unwrap();
            for maxiters in 2..6 {
                let next = sigma_clip(&values, sigma, maxiters).unwrap();
                for (before, after) in previous.iter().zip(&next) {
                    prop_assert!(!before || *after);
                }
                previous = next;
            }
        }
    }
}
