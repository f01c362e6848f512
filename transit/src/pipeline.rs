//! End-to-end run for one target or file.
//!
//! Stages write their products under the project directories:
//!
//! | stage    | output                                                    |
//! |----------|-----------------------------------------------------------|
//! | acquire  | `data/lightcurve_raw_<target>.{csv,fits}` (targets only)  |
//! | clean    | `data/lightcurve_clean.{csv,fits}`                        |
//! | detrend  | `data/lightcurve_detrended.detrended.{csv,fits}`          |
//! | search   | `data/bls_results.csv`, `data/bls_results.summary.json`   |
//! | plot     | `plots/figure_{lightcurve,bls,phase}.png`                 |
//!
//! Figures are best effort: a failed plot is logged and the run continues.

use crate::bls::BlsPeriodogram;
use crate::clean::{clean_lightcurve, CleanReport};
use crate::config::{PipelineConfig, ProjectDirs};
use crate::detrend::{flatten, save_outputs, Flattened};
use crate::plot::{figure_path, plot_bls, plot_lightcurve, plot_phase_fold};
use crate::search::{run_bls, save_bls_results, write_summary, BlsSummary};
use crate::Result;
use lightcurve::archive::default_cache_dir;
use lightcurve::{load_lightcurve, save_lightcurve, search_and_download, LightCurve, MastClient};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where the light curve comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Target name resolved and downloaded from MAST
    Target(String),
    /// Local FITS or CSV file
    File(PathBuf),
}

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub clean: CleanReport,
    pub summary: BlsSummary,
    /// Every data product written, in stage order
    pub data_files: Vec<PathBuf>,
    /// Figures that were rendered
    pub plots: Vec<PathBuf>,
}

/// `TIC 25155310` becomes `TIC_25155310`.
pub fn target_file_stem(target: &str) -> String {
    target.trim().replace(' ', "_")
}

/// Per-target output prefix: `data/lightcurve_raw` becomes
/// `data/lightcurve_raw_TIC_25155310` for `TIC 25155310`.
pub fn target_output_prefix<P: AsRef<Path>>(prefix: P, target: &str) -> PathBuf {
    let mut name = prefix.as_ref().as_os_str().to_os_string();
    name.push(format!("_{}", target_file_stem(target)));
    name.into()
}

pub struct Pipeline {
    config: PipelineConfig,
    dirs: ProjectDirs,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, dirs: ProjectDirs) -> Self {
        Self { config, dirs }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dirs(&self) -> &ProjectDirs {
        &self.dirs
    }

    fn data_path(&self, name: &str) -> PathBuf {
        self.dirs.data_dir().join(name)
    }

    /// Download (and save) or load the raw light curve.
    pub fn acquire(&self, source: &Source) -> Result<(LightCurve, Vec<PathBuf>)> {
        match source {
            Source::File(path) => Ok((load_lightcurve(path)?, Vec::new())),
            Source::Target(target) => {
                let download = &self.config.download;
                let cache = download.cache_dir.clone().unwrap_or_else(default_cache_dir);
                let client = MastClient::new()?;
                let lc = search_and_download(
                    &client,
                    target,
                    &download.mission,
                    download.author.as_deref(),
                    download.limit,
                    cache,
                )?;
                let prefix = target_output_prefix(self.data_path("lightcurve_raw"), target);
                let written = save_lightcurve(&lc, prefix)?;
                Ok((lc, written))
            }
        }
    }

    /// Clean and save `data/lightcurve_clean.*`.
    pub fn clean(&self, raw: &LightCurve) -> Result<(LightCurve, CleanReport, Vec<PathBuf>)> {
        let (lc, report) = clean_lightcurve(raw, &self.config.clean)?;
        let written = save_lightcurve(&lc, self.data_path("lightcurve_clean"))?;
        Ok((lc, report, written))
    }

    /// Flatten and save `data/lightcurve_detrended.detrended.*`.
    pub fn detrend(&self, clean: &LightCurve) -> Result<(Flattened, Vec<PathBuf>)> {
        let flattened = flatten(&clean.sort_by_time(), &self.config.detrend)?;
        let written = save_outputs(
            &flattened,
            self.data_path("lightcurve_detrended"),
            self.config.detrend.save_trend,
        )?;
        Ok((flattened, written))
    }

    /// Search and save the periodogram table and summary.
    pub fn search(&self, flat: &LightCurve) -> Result<(BlsPeriodogram, BlsSummary, Vec<PathBuf>)> {
        let periodogram = run_bls(flat, &self.config.search)?;
        let results = self.data_path("bls_results.csv");
        save_bls_results(&periodogram, &results)?;
        let summary = BlsSummary::from_periodogram(&periodogram)?;
        let summary_file = write_summary(&summary, &results)?;
        Ok((periodogram, summary, vec![results, summary_file]))
    }

    /// Render the three figures, skipping any that fail.
    ///
    /// The phase plot is centred on the candidate's transit time when known.
    pub fn plot(
        &self,
        flat: &LightCurve,
        periodogram: &BlsPeriodogram,
        summary: &BlsSummary,
    ) -> Vec<PathBuf> {
        let prefix = self.dirs.plots_dir().join(&self.config.plot.prefix);
        let mut plots = Vec::new();
        let mut attempt = |path: PathBuf, result: Result<()>| match result {
            Ok(()) => plots.push(path),
            Err(e) => warn!("Skipping {}: {e}", path.display()),
        };

        let path = figure_path(&prefix, "lightcurve");
        let result = plot_lightcurve(flat, &path, "Lightcurve");
        attempt(path, result);

        let path = figure_path(&prefix, "bls");
        let result = plot_bls(&periodogram.period, &periodogram.power, &path);
        attempt(path, result);

        let path = figure_path(&prefix, "phase");
        let epoch = summary.transit_time.is_finite().then_some(summary.transit_time);
        let result = plot_phase_fold(flat, summary.best_period, epoch, &path, self.config.plot.bins);
        attempt(path, result);

        plots
    }

    /// Run every stage.
    pub fn run(&self, source: &Source) -> Result<PipelineReport> {
        self.dirs.ensure()?;
        info!("Pipeline root: {}", self.dirs.root().display());

        let (raw, mut data_files) = self.acquire(source)?;
        info!("Raw light curve: {} points", raw.len());

        let (clean, clean_report, written) = self.clean(&raw)?;
        data_files.extend(written);

        let (flattened, written) = self.detrend(&clean)?;
        data_files.extend(written);

        let (periodogram, summary, written) = self.search(&flattened.flat)?;
        data_files.extend(written);

        let plots = self.plot(&flattened.flat, &periodogram, &summary);

        info!(
            "Done: best period {:.6} d (power {:.4}), {} files, {} plots",
            summary.best_period,
            summary.best_power,
            data_files.len(),
            plots.len()
        );
        Ok(PipelineReport {
            clean: clean_report,
            summary,
            data_files,
            plots,
        })
    }
}
