//! Full pipeline runs on synthetic light curves written to disk

use approx::assert_relative_eq;
use lightcurve::io::write_csv;
use lightcurve::{load_lightcurve, LightCurve};
use ndarray::Array1;
use std::path::Path;
use tempfile::TempDir;
use test_helpers::{generate_transit_series, SyntheticTransitConfig};
use transit::config::{PipelineConfig, ProjectDirs};
use transit::search::{read_bls_results, summary_path};
use transit::{run_bls, BlsSummary, Pipeline, Source};

fn synthetic_config() -> SyntheticTransitConfig {
    SyntheticTransitConfig {
        baseline_flux: 1200.0,
        trend_amplitude: 0.01,
        outliers: 8,
        nan_fraction: 0.01,
        ..Default::default()
    }
}

fn write_input(dir: &Path, config: &SyntheticTransitConfig) -> (std::path::PathBuf, usize) {
    let series = generate_transit_series(config);
    let lc = LightCurve::new(
        Array1::from(series.time.clone()),
        Array1::from(series.flux.clone()),
        Array1::from(series.flux_err.clone()),
    )
    .unwrap();
    let path = dir.join("input.csv");
    write_csv(&lc, &path).unwrap();
    (path, series.len())
}

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.detrend.window_length = 101;
    config.search.min_period = 1.0;
    config.search.max_period = 6.0;
    config.search.n_periods = 3000;
    config
}

fn run(dir: &TempDir, config: PipelineConfig) -> transit::PipelineReport {
    let (input, _) = write_input(dir.path(), &synthetic_config());
    Pipeline::new(config, ProjectDirs::with_root(dir.path()))
        .run(&Source::File(input))
        .unwrap()
}

#[test]
fn test_pipeline_recovers_injected_period() {
    let dir = TempDir::new().unwrap();
    let report = run(&dir, fast_config());

    assert!((report.summary.best_period - 3.2).abs() < 0.01);
    assert_relative_eq!(report.summary.depth, 0.01, epsilon = 0.003);
    assert!(report.summary.depth_snr > 20.0);

    assert!(report.clean.after_nans < report.clean.initial);
    assert!(report.clean.after_outliers + 8 <= report.clean.after_nans);
}

#[test]
fn test_pipeline_writes_expected_layout() {
    let dir = TempDir::new().unwrap();
    let report = run(&dir, fast_config());

    let data = dir.path().join("data");
    for name in [
        "lightcurve_clean.csv",
        "lightcurve_detrended.detrended.csv",
        "bls_results.csv",
        "bls_results.summary.json",
    ] {
        assert!(data.join(name).exists(), "missing {name}");
    }
    assert!(!data.join("lightcurve_detrended.trend.csv").exists());
    assert!(report.data_files.iter().all(|p| p.exists()));
    assert!(report.plots.iter().all(|p| p.exists()));

    let summary: BlsSummary = lightcurve::read_json(summary_path(data.join("bls_results.csv"))).unwrap();
    assert_eq!(summary, report.summary);

    let periodogram = read_bls_results(data.join("bls_results.csv")).unwrap();
    assert_eq!(periodogram.len(), 3000);
    assert_eq!(periodogram.period[0], 1.0);
    assert_eq!(periodogram.period[2999], 6.0);
}

#[test]
fn test_saved_trend_when_requested() {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config();
    config.detrend.save_trend = true;
    config.search.n_periods = 200;
    run(&dir, config);
    assert!(dir.path().join("data/lightcurve_detrended.trend.csv").exists());
}

#[test]
fn test_stages_chain_through_files() {
    let dir = TempDir::new().unwrap();
    let config = fast_config();
    let report = run(&dir, config.clone());

    // searching the detrended file again gives the same answer
    let flat = load_lightcurve(dir.path().join("data/lightcurve_detrended.detrended.csv")).unwrap();
    let periodogram = run_bls(&flat, &config.search).unwrap();
    let summary = BlsSummary::from_periodogram(&periodogram).unwrap();
    assert_relative_eq!(summary.best_period, report.summary.best_period, epsilon = 1e-9);

    let clean = load_lightcurve(dir.path().join("data/lightcurve_clean.csv")).unwrap();
    assert_eq!(clean.len(), report.clean.after_outliers);
    assert!(clean.has_flux_err());
}

#[test]
fn test_pipeline_rejects_too_short_input() {
    let dir = TempDir::new().unwrap();
    let lc = LightCurve::from_time_flux(
        (0..8).map(|i| i as f64 * 0.1).collect(),
        vec![1.0, 1.01, 0.99, 1.0, 1.0, 1.02, 0.98, 1.0],
    )
    .unwrap();
    let input = dir.path().join("short.csv");
    write_csv(&lc, &input).unwrap();

    let result = Pipeline::new(fast_config(), ProjectDirs::with_root(dir.path()))
        .run(&Source::File(input));
    assert!(result.is_err());
}
