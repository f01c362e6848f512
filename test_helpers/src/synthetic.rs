//! Synthetic transit light curves for tests and benchmarks.
//!
//! Produces a regularly sampled time series with an optional mid-baseline data
//! gap (the TESS orbit downlink), a box-shaped transit, a slow sinusoidal
//! trend, Gaussian white noise, injected outliers and NaN cadences. Everything
//! is driven by a seeded `StdRng` so the same config always yields the same
//! samples.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Parameters for a synthetic light curve
#[derive(Debug, Clone)]
pub struct SyntheticTransitConfig {
    /// First timestamp (days)
    pub start_time: f64,
    /// Total baseline (days)
    pub baseline: f64,
    /// Sampling interval (days)
    pub cadence: f64,
    /// Orbital period of the injected planet (days)
    pub period: f64,
    /// Mid-transit time of the first transit (days)
    pub transit_time: f64,
    /// Full transit duration (days)
    pub duration: f64,
    /// Fractional transit depth
    pub depth: f64,
    /// Out-of-transit flux level
    pub baseline_flux: f64,
    /// Gaussian noise sigma, relative to the baseline flux
    pub noise_std: f64,
    /// Relative amplitude of the sinusoidal trend (0 disables it)
    pub trend_amplitude: f64,
    /// Period of the sinusoidal trend (days)
    pub trend_period: f64,
    /// Length of a data gap centred on the baseline (days, 0 disables it)
    pub gap: f64,
    /// Fraction of cadences turned into NaN flux
    pub nan_fraction: f64,
    /// Number of large positive flux outliers to inject
    pub outliers: usize,
    pub seed: u64,
}

impl Default for SyntheticTransitConfig {
    fn default() -> Self {
        Self {
            start_time: 1325.0,
            baseline: 27.0,
            cadence: 10.0 / 1440.0,
            period: 3.2,
            transit_time: 1326.1,
            duration: 0.12,
            depth: 0.01,
            baseline_flux: 1.0,
            noise_std: 0.001,
            trend_amplitude: 0.0,
            trend_period: 9.0,
            gap: 0.0,
            nan_fraction: 0.0,
            outliers: 0,
            seed: 42,
        }
    }
}

/// Columns of a generated light curve
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub time: Vec<f64>,
    pub flux: Vec<f64>,
    pub flux_err: Vec<f64>,
    /// Indices that received an injected outlier
    pub outlier_indices: Vec<usize>,
}

impl SyntheticSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// True when `t` falls inside a transit of the configured planet.
pub fn in_transit(t: f64, config: &SyntheticTransitConfig) -> bool {
    let phase = (t - config.transit_time).rem_euclid(config.period);
    let half = config.duration / 2.0;
    phase < half || phase > config.period - half
}

/// Generate a synthetic transit light curve.
pub fn generate_transit_series(config: &SyntheticTransitConfig) -> SyntheticSeries {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise_sigma = config.noise_std * config.baseline_flux;
    let noise = Normal::new(0.0, noise_sigma.max(f64::MIN_POSITIVE)).unwrap();

    let n = (config.baseline / config.cadence).floor() as usize;
    let gap_centre = config.start_time + config.baseline / 2.0;
    let gap_half = config.gap / 2.0;

    let mut time = Vec::with_capacity(n);
    let mut flux = Vec::with_capacity(n);
    let mut flux_err = Vec::with_capacity(n);

    for i in 0..n {
        let t = config.start_time + i as f64 * config.cadence;
        if config.gap > 0.0 && (t - gap_centre).abs() < gap_half {
            continue;
        }

        let mut f = config.baseline_flux;
        if config.trend_amplitude != 0.0 {
            let arg = 2.0 * std::f64::consts::PI * (t - config.start_time) / config.trend_period;
            f *= 1.0 + config.trend_amplitude * arg.sin();
        }
        if in_transit(t, config) {
            f *= 1.0 - config.depth;
        }
        if noise_sigma > 0.0 {
            f += noise.sample(&mut rng);
        }

        time.push(t);
        flux.push(f);
        flux_err.push(noise_sigma);
    }

    let mut outlier_indices = Vec::with_capacity(config.outliers);
    while outlier_indices.len() < config.outliers.min(flux.len()) {
        let idx = rng.random_range(0..flux.len());
        if outlier_indices.contains(&idx) || in_transit(time[idx], config) {
            continue;
        }
        flux[idx] += config.baseline_flux * 0.2;
        outlier_indices.push(idx);
    }
    outlier_indices.sort_unstable();

    if config.nan_fraction > 0.0 {
        for (i, f) in flux.iter_mut().enumerate() {
            if outlier_indices.binary_search(&i).is_ok() {
                continue;
            }
            if rng.random::<f64>() < config.nan_fraction {
                *f = f64::NAN;
            }
        }
    }

    SyntheticSeries {
        time,
        flux,
        flux_err,
        outlier_indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_is_deterministic() {
        let config = SyntheticTransitConfig::default();
        let a = generate_transit_series(&config);
        let b = generate_transit_series(&config);
        assert_eq!(a.time, b.time);
        assert_eq!(a.flux, b.flux);
    }

    #[test]
    fn test_transit_depth_without_noise() {
        let config = SyntheticTransitConfig {
            noise_std: 0.0,
            ..Default::default()
        };
        let series = generate_transit_series(&config);
        let min = series.flux.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((min - 0.99).abs() < 1e-12);
        let max = series.flux.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gap_removes_samples() {
        let full = generate_transit_series(&SyntheticTransitConfig::default());
        let gapped = generate_transit_series(&SyntheticTransitConfig {
            gap: 1.0,
            ..Default::default()
        });
        assert!(gapped.len() < full.len());
        let max_step = gapped
            .time
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(0.0, f64::max);
        assert!(max_step > 0.9);
    }

    #[test]
    fn test_outliers_and_nans() {
        let config = SyntheticTransitConfig {
            outliers: 5,
            nan_fraction: 0.05,
            ..Default::default()
        };
        let series = generate_transit_series(&config);
        assert_eq!(series.outlier_indices.len(), 5);
        for &i in &series.outlier_indices {
            assert!(series.flux[i] > 1.1);
        }
        let nans = series.flux.iter().filter(|f| f.is_nan()).count();
        assert!(nans > 0);
    }
}
