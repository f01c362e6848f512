//! Period search on a flattened light curve and its on-disk results.

use crate::bls::{BlsPeak, BlsPeriodogram, BoxLeastSquares};
use crate::config::SearchConfig;
use crate::grid::{duration_grid, linear_period_grid};
use crate::{Result, TransitError};
use lightcurve::io::with_suffix;
use lightcurve::LightCurve;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Best candidate of a search, as stored in `<results>.summary.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlsSummary {
    pub best_period: f64,
    pub best_power: f64,
    pub duration: f64,
    pub transit_time: f64,
    pub depth: f64,
    pub depth_snr: f64,
}

impl From<BlsPeak> for BlsSummary {
    fn from(peak: BlsPeak) -> Self {
        Self {
            best_period: peak.period,
            best_power: peak.power,
            duration: peak.duration,
            transit_time: peak.transit_time,
            depth: peak.depth,
            depth_snr: peak.depth_snr,
        }
    }
}

impl BlsSummary {
    /// Summary of the highest non-NaN power.
    pub fn from_periodogram(periodogram: &BlsPeriodogram) -> Result<Self> {
        periodogram
            .best()
            .map(Self::from)
            .ok_or(TransitError::InsufficientData {
                what: "best period",
                needed: 1,
                found: 0,
            })
    }
}

/// Run Box Least Squares over the configured period grid.
///
/// Durations are log-spaced between the clamped per-period guesses and
/// flux uncertainties are used as weights when the curve has them.
pub fn run_bls(lc: &LightCurve, config: &SearchConfig) -> Result<BlsPeriodogram> {
    let periods = linear_period_grid(config.min_period, config.max_period, config.n_periods)?;
    let durations = duration_grid(&periods, config.duration_fraction, config.n_durations);

    let time = lc.time.to_vec();
    let flux = lc.flux.to_vec();
    let flux_err = lc.flux_err.to_vec();
    let dy = lc.has_flux_err().then_some(flux_err.as_slice());
    let bls = BoxLeastSquares::new(&time, &flux, dy)?;

    info!(
        "Running BLS on {} points: {} periods in [{}, {}] d, {} durations in [{:.4}, {:.4}] d",
        bls.len(),
        periods.len(),
        config.min_period,
        config.max_period,
        durations.len(),
        durations.first().copied().unwrap_or(f64::NAN),
        durations.last().copied().unwrap_or(f64::NAN),
    );

    bls.power(&periods, &durations, config.objective, config.oversample)
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    period: f64,
    power: f64,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    transit_time: Option<f64>,
    #[serde(default)]
    depth: Option<f64>,
    #[serde(default)]
    depth_snr: Option<f64>,
}

/// Write the periodogram table, creating parent directories.
pub fn save_bls_results<P: AsRef<Path>>(periodogram: &BlsPeriodogram, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    for i in 0..periodogram.len() {
        wtr.serialize(ResultRow {
            period: periodogram.period[i],
            power: periodogram.power[i],
            duration: Some(periodogram.duration[i]),
            transit_time: Some(periodogram.transit_time[i]),
            depth: Some(periodogram.depth[i]),
            depth_snr: Some(periodogram.depth_snr[i]),
        })?;
    }
    wtr.flush()?;
    info!("Saved BLS results to {}", path.display());
    Ok(())
}

/// Read a periodogram table.
///
/// Only `period` and `power` are required; other columns default to NaN.
pub fn read_bls_results<P: AsRef<Path>>(path: P) -> Result<BlsPeriodogram> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(lightcurve::LightCurveError::NotFound(path.to_path_buf()).into());
    }

    let mut rdr = csv::Reader::from_path(path)?;
    let mut pg = BlsPeriodogram::default();
    for row in rdr.deserialize() {
        let row: ResultRow = row?;
        pg.period.push(row.period);
        pg.power.push(row.power);
        pg.duration.push(row.duration.unwrap_or(f64::NAN));
        pg.transit_time.push(row.transit_time.unwrap_or(f64::NAN));
        pg.depth.push(row.depth.unwrap_or(f64::NAN));
        pg.depth_err.push(f64::NAN);
        pg.depth_snr.push(row.depth_snr.unwrap_or(f64::NAN));
        pg.log_likelihood.push(f64::NAN);
    }
    Ok(pg)
}

/// `data/bls_results.csv` gives `data/bls_results.summary.json`.
pub fn summary_path<P: AsRef<Path>>(results_path: P) -> PathBuf {
    with_suffix(results_path, "summary.json")
}

/// Write the summary next to the results table and return its path.
pub fn write_summary<P: AsRef<Path>>(summary: &BlsSummary, results_path: P) -> Result<PathBuf> {
    let path = summary_path(results_path);
    lightcurve::write_json(&path, summary)?;
    info!(
        "Best period: {:.6} d, power {:.4} (summary: {})",
        summary.best_period,
        summary.best_power,
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_helpers::{generate_transit_series, SyntheticTransitConfig};

    fn small_periodogram() -> BlsPeriodogram {
        BlsPeriodogram {
            period: vec![1.0, 2.0, 3.0],
            power: vec![0.5, 3.0, f64::NAN],
            duration: vec![0.05, 0.1, 0.15],
            transit_time: vec![1.1, 1.2, 1.3],
            depth: vec![0.001, 0.01, f64::NAN],
            depth_err: vec![0.001; 3],
            depth_snr: vec![1.0, 10.0, f64::NAN],
            log_likelihood: vec![0.5, 3.0, 0.0],
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_picks_max_power() {
        let summary = BlsSummary::from_periodogram(&small_periodogram()).unwrap();
        assert_eq!(summary.best_period, 2.0);
        assert_eq!(summary.best_power, 3.0);
        assert_eq!(summary.depth_snr, 10.0);
        assert!(BlsSummary::from_periodogram(&BlsPeriodogram::default()).is_err());
    }

    #[test]
    fn test_results_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/bls_results.csv");
        save_bls_results(&small_periodogram(), &path).unwrap();

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("period,power,duration,transit_time,depth,depth_snr"));

        let pg = read_bls_results(&path).unwrap();
        assert_eq!(pg.period, vec![1.0, 2.0, 3.0]);
        assert_eq!(pg.power[1], 3.0);
        assert!(pg.power[2].is_nan());
        assert_eq!(pg.best_index(), Some(1));
    }

    #[test]
    fn test_read_minimal_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bls.csv");
        std::fs::write(&path, "period,power\n1.5,0.2\n2.5,0.9\n").unwrap();
        let pg = read_bls_results(&path).unwrap();
        assert_eq!(pg.len(), 2);
        assert!(pg.duration[0].is_nan());
        assert_eq!(BlsSummary::from_periodogram(&pg).unwrap().best_period, 2.5);
    }

    #[test]
    fn test_summary_json_location() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("bls_results.csv");
        let summary = BlsSummary::from_periodogram(&small_periodogram()).unwrap();
        let path = write_summary(&summary, &results).unwrap();
        assert_eq!(path, dir.path().join("bls_results.summary.json"));

        let loaded: BlsSummary = lightcurve::read_json(&path).unwrap();
        assert_eq!(loaded, summary);
    }

    #[test]
    fn test_run_bls_finds_injected_period() {
        let series = generate_transit_series(&SyntheticTransitConfig::default());
        let lc = LightCurve::from_time_flux(series.time, series.flux).unwrap();
        let config = SearchConfig {
            min_period: 1.0,
            max_period: 6.0,
            n_periods: 2000,
            ..Default::default()
        };
        let pg = run_bls(&lc, &config).unwrap();
        assert_eq!(pg.len(), 2000);
        let best = BlsSummary::from_periodogram(&pg).unwrap();
        assert_relative_eq!(best.best_period, 3.2, epsilon = 0.01);
        assert_relative_eq!(best.depth, 0.01, epsilon = 0.003);
    }

    #[test]
    fn test_run_bls_rejects_bad_grid() {
        let lc = LightCurve::from_time_flux((0..20).map(f64::from).collect(), vec![1.0; 20]).unwrap();
        let config = SearchConfig {
            min_period: 5.0,
            max_period: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            run_bls(&lc, &config),
            Err(TransitError::InvalidPeriodGrid(_))
        ));
    }
}
