//! Savitzky-Golay detrending.
//!
//! [`flatten`] estimates the slow stellar/instrumental trend with a
//! Savitzky-Golay filter and divides it out. The series is split into
//! segments at gaps, the filter runs on each segment separately, and a few
//! iterations progressively exclude outliers (transits included) from the
//! trend fit. Excluded samples get a trend linearly interpolated in time from
//! their neighbours.

use crate::clean::sigma_clip;
use crate::config::DetrendConfig;
use crate::interp::interp_clamped;
use crate::{Result, TransitError};
use lightcurve::io::save_lightcurve_with_suffix;
use lightcurve::stats::nanmedian;
use lightcurve::LightCurve;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use std::path::{Path, PathBuf};

/// Output of [`flatten`].
#[derive(Debug, Clone)]
pub struct Flattened {
    /// Flux divided by the trend
    pub flat: LightCurve,
    /// Trend estimate on the same timestamps; uncertainties are NaN
    pub trend: LightCurve,
}

fn vandermonde(z: &[f64], order: usize) -> DMatrix<f64> {
    DMatrix::from_fn(z.len(), order + 1, |i, j| z[i].powi(j as i32))
}

/// Least-squares polynomial coefficients, lowest power first.
fn polyfit(z: &[f64], y: &[f64], order: usize) -> Result<DVector<f64>> {
    let a = vandermonde(z, order);
    let b = DVector::from_column_slice(y);
    a.svd(true, true)
        .solve(&b, 1e-12)
        .map_err(|_| TransitError::SingularFit(order))
}

fn polyval(coeffs: &DVector<f64>, z: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * z + c)
}

/// Window positions rescaled to [-1, 1].
fn scaled_positions(n: usize) -> Vec<f64> {
    let half = (n / 2).max(1) as f64;
    (0..n).map(|k| (k as f64 - (n / 2) as f64) / half).collect()
}

/// Smoothing weights: value of the least-squares polynomial at the window centre.
fn savgol_coeffs(window_length: usize, polyorder: usize) -> Result<Vec<f64>> {
    let a = vandermonde(&scaled_positions(window_length), polyorder);
    let ata = a.transpose() * &a;
    let inv = ata
        .try_inverse()
        .ok_or(TransitError::SingularFit(polyorder))?;
    let pinv = inv * a.transpose();
    Ok(pinv.row(0).iter().copied().collect())
}

fn check_window(window_length: usize, polyorder: usize) -> Result<()> {
    if window_length % 2 == 0 {
        return Err(TransitError::InvalidWindow(format!(
            "window_length must be odd, got {window_length}"
        )));
    }
    if polyorder >= window_length {
        return Err(TransitError::InvalidWindow(format!(
            "polyorder {polyorder} must be less than window_length {window_length}"
        )));
    }
    Ok(())
}

/// Savitzky-Golay smoothing of evenly sampled values.
///
/// Interior samples use the convolution weights. The first and last
/// `window_length / 2` samples take the value of a polynomial fitted to the
/// first (last) full window.
///
/// # Errors
/// [`TransitError::InvalidWindow`] when the window is even, not longer than
/// `polyorder`, or longer than the data.
pub fn savgol_filter(y: &[f64], window_length: usize, polyorder: usize) -> Result<Vec<f64>> {
    check_window(window_length, polyorder)?;
    let n = y.len();
    if window_length > n {
        return Err(TransitError::InvalidWindow(format!(
            "window_length {window_length} exceeds the {n} available samples"
        )));
    }

    let half = window_length / 2;
    let coeffs = savgol_coeffs(window_length, polyorder)?;
    let mut out = vec![0.0; n];
    for i in half..n - half {
        out[i] = coeffs
            .iter()
            .zip(&y[i - half..=i + half])
            .map(|(c, v)| c * v)
            .sum();
    }

    let z = scaled_positions(window_length);
    let head = polyfit(&z, &y[..window_length], polyorder)?;
    for i in 0..half {
        out[i] = polyval(&head, z[i]);
    }
    let tail_start = n - window_length;
    let tail = polyfit(&z, &y[tail_start..], polyorder)?;
    for k in window_length - half..window_length {
        out[tail_start + k] = polyval(&tail, z[k]);
    }

    Ok(out)
}

/// Smooth one segment, shrinking the window when the segment is short.
fn smooth_segment(y: &[f64], window_length: usize, polyorder: usize) -> Result<Vec<f64>> {
    let n = y.len();
    match n {
        0 => return Ok(Vec::new()),
        1 => return Ok(y.to_vec()),
        _ => {}
    }
    let window = if n >= window_length {
        window_length
    } else if n % 2 == 1 {
        n
    } else {
        n - 1
    };
    if window > polyorder {
        return savgol_filter(y, window, polyorder);
    }
    // too short for the polynomial
    Ok(vec![nanmedian(y); n])
}

/// Index ranges of runs without gaps longer than `break_tolerance` cadences.
pub fn split_segments(time: &[f64], break_tolerance: f64) -> Vec<std::ops::Range<usize>> {
    if time.is_empty() {
        return Vec::new();
    }
    let steps: Vec<f64> = time.windows(2).map(|w| w[1] - w[0]).collect();
    let cadence = nanmedian(
        &steps
            .iter()
            .copied()
            .filter(|dt| dt.is_finite() && *dt > 0.0)
            .collect::<Vec<_>>(),
    );

    let mut segments = Vec::new();
    let mut start = 0;
    if cadence.is_finite() {
        let limit = break_tolerance * cadence;
        for (i, dt) in steps.iter().enumerate() {
            if *dt > limit {
                segments.push(start..i + 1);
                start = i + 1;
            }
        }
    }
    segments.push(start..time.len());
    segments
}

/// Trend over all samples, fitted only on samples where `fit_mask` holds.
fn estimate_trend(
    time: &[f64],
    flux: &[f64],
    fit_mask: &[bool],
    segments: &[std::ops::Range<usize>],
    config: &DetrendConfig,
) -> Result<Vec<f64>> {
    let mut trend = vec![f64::NAN; flux.len()];
    for seg in segments {
        let idx: Vec<usize> = seg.clone().filter(|&i| fit_mask[i]).collect();
        if idx.is_empty() {
            debug!("Segment {seg:?} has no samples to fit; trend left undefined");
            continue;
        }
        let y: Vec<f64> = idx.iter().map(|&i| flux[i]).collect();
        let smooth = smooth_segment(&y, config.window_length, config.polyorder)?;

        let known_t: Vec<f64> = idx.iter().map(|&i| time[i]).collect();
        let filled = interp_clamped(&time[seg.clone()], &known_t, &smooth)
            .map_err(|e| TransitError::InvalidConfig(format!("trend interpolation: {e}")))?;
        trend[seg.clone()].copy_from_slice(&filled);
    }
    Ok(trend)
}

/// Remove long-term trends with an iterative Savitzky-Golay filter.
///
/// Timestamps must be ascending. Samples with non-finite flux never enter
/// the fit and stay NaN in the flattened curve.
///
/// # Arguments
/// * `lc` - Light curve sorted by time
/// * `config` - Window length (odd, in samples), polynomial order, gap
///   tolerance in cadences and the outlier masking passes
///
/// # Returns
/// * `Ok(Flattened)` - `flat` is flux divided by the trend; `trend` carries
///   the trend itself as its flux column
/// * `Err(InvalidWindow)` - Even window or `polyorder >= window_length`
/// * `Err(InsufficientData)` - Empty light curve
///
/// # Examples
///
/// ```rust
/// use lightcurve::LightCurve;
/// use transit::{flatten, DetrendConfig};
///
/// let time: Vec<f64> = (0..500).map(|i| i as f64 * 0.02).collect();
/// let flux: Vec<f64> = time.iter().map(|t| 100.0 + 2.0 * t).collect();
/// let lc = LightCurve::from_time_flux(time, flux).unwrap();
///
/// let config = DetrendConfig { window_length: 51, ..Default::default() };
/// let flattened = flatten(&lc, &config).unwrap();
/// assert!(flattened.flat.flux.iter().all(|f| (f - 1.0).abs() < 1e-9));
/// ```
pub fn flatten(lc: &LightCurve, config: &DetrendConfig) -> Result<Flattened> {
    config.validate()?;
    if lc.is_empty() {
        return Err(TransitError::InsufficientData {
            what: "detrending",
            needed: 1,
            found: 0,
        });
    }

    info!(
        "Flattening with window_length={} polyorder={}",
        config.window_length, config.polyorder
    );

    let time = lc.time.to_vec();
    let flux = lc.flux.to_vec();
    let segments = split_segments(&time, config.break_tolerance);
    if segments.len() > 1 {
        info!("Detrending {} segments separated by gaps", segments.len());
    }

    let mut fit_mask: Vec<bool> = flux.iter().map(|f| f.is_finite()).collect();
    let mut trend = estimate_trend(&time, &flux, &fit_mask, &segments, config)?;

    for iter in 1..config.niters {
        let residual: Vec<f64> = flux
            .iter()
            .zip(&trend)
            .zip(&fit_mask)
            .map(|((f, t), &m)| if m { f - t } else { f64::NAN })
            .collect();
        let clipped = match sigma_clip(&residual, config.sigma, 5) {
            Ok(c) => c,
            Err(e) => {
                warn!("Outlier masking stopped at iteration {iter}: {e}");
                break;
            }
        };
        let before = fit_mask.iter().filter(|&&m| m).count();
        for (m, c) in fit_mask.iter_mut().zip(&clipped) {
            *m = *m && !c;
        }
        let after = fit_mask.iter().filter(|&&m| m).count();
        debug!("Iteration {iter}: {} samples excluded from trend fit", before - after);
        if before == after {
            break;
        }
        trend = estimate_trend(&time, &flux, &fit_mask, &segments, config)?;
    }

    let trend = Array1::from(trend);
    let flat = LightCurve {
        time: lc.time.clone(),
        flux: &lc.flux / &trend,
        flux_err: &lc.flux_err / &trend,
        meta: lc.meta.clone(),
    };
    let trend = LightCurve {
        time: lc.time.clone(),
        flux: trend,
        flux_err: Array1::from_elem(lc.len(), f64::NAN),
        meta: lc.meta.clone(),
    };

    Ok(Flattened { flat, trend })
}

/// Write `<prefix>.detrended.*` and, if requested, `<prefix>.trend.*`.
pub fn save_outputs<P: AsRef<Path>>(
    flattened: &Flattened,
    prefix: P,
    save_trend: bool,
) -> Result<Vec<PathBuf>> {
    let mut written = save_lightcurve_with_suffix(&flattened.flat, &prefix, "detrended")?;
    if save_trend {
        written.extend(save_lightcurve_with_suffix(&flattened.trend, &prefix, "trend")?);
    }
    Ok(written)
}
