//! Pipeline parameters and project directory layout.
//!
//! Every stage has its own config struct with the defaults used by the
//! command line tools. [`PipelineConfig`] bundles them and can be stored as
//! JSON so a run can be repeated with identical settings; missing fields in
//! the file fall back to the defaults.

use crate::bls::Objective;
use crate::{Result, TransitError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the project root.
pub const ROOT_ENV_VAR: &str = "TRANSIT_ROOT";

/// Archive search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Mission collection name at MAST
    pub mission: String,
    /// Pipeline that produced the light curves (e.g. "SPOC"); all when unset
    pub author: Option<String>,
    /// Keep only the first N search results
    pub limit: Option<usize>,
    /// Directory for downloaded product files; the user cache when unset
    pub cache_dir: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            mission: "TESS".to_string(),
            author: None,
            limit: None,
            cache_dir: None,
        }
    }
}

/// Outlier removal and normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Clipping threshold in standard deviations
    pub sigma: f64,
    /// Maximum clipping iterations
    pub maxiters: usize,
    /// Divide by the median flux afterwards
    pub normalize: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            sigma: 5.0,
            maxiters: 5,
            normalize: true,
        }
    }
}

/// Savitzky-Golay flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetrendConfig {
    /// Smoothing window in samples (odd)
    pub window_length: usize,
    /// Polynomial order fitted inside each window
    pub polyorder: usize,
    /// Gaps longer than this many median cadences split the series
    pub break_tolerance: f64,
    /// Trend/outlier-mask iterations
    pub niters: usize,
    /// Outlier threshold for masking samples out of the trend fit
    pub sigma: f64,
    /// Also write the trend next to the flattened curve
    pub save_trend: bool,
}

impl Default for DetrendConfig {
    fn default() -> Self {
        Self {
            window_length: 401,
            polyorder: 2,
            break_tolerance: 5.0,
            niters: 3,
            sigma: 3.0,
            save_trend: false,
        }
    }
}

impl DetrendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_length % 2 == 0 {
            return Err(TransitError::InvalidWindow(format!(
                "window_length must be odd, got {}",
                self.window_length
            )));
        }
        if self.window_length <= self.polyorder {
            return Err(TransitError::InvalidWindow(format!(
                "polyorder {} must be less than window_length {}",
                self.polyorder, self.window_length
            )));
        }
        if self.niters == 0 {
            return Err(TransitError::InvalidConfig(
                "niters must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Box Least Squares grid and objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Shortest trial period (days)
    pub min_period: f64,
    /// Longest trial period (days)
    pub max_period: f64,
    /// Number of trial periods
    pub n_periods: usize,
    /// Typical duration as a fraction of the period
    pub duration_fraction: f64,
    /// Number of trial durations
    pub n_durations: usize,
    /// Phase bins per shortest duration
    pub oversample: usize,
    pub objective: Objective,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_period: 0.5,
            max_period: 10.0,
            n_periods: 20000,
            duration_fraction: 0.05,
            n_durations: 8,
            oversample: 10,
            objective: Objective::LogLikelihood,
        }
    }
}

/// Figure options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Bin edges for the phase-folded binned curve
    pub bins: usize,
    /// Prefix inside the plots directory
    pub prefix: String,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            bins: 200,
            prefix: "figure".to_string(),
        }
    }
}

/// Parameters for a full pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub download: DownloadConfig,
    pub clean: CleanConfig,
    pub detrend: DetrendConfig,
    pub search: SearchConfig,
    pub plot: PlotConfig,
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config: Self = lightcurve::read_json(path)?;
        config.detrend.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        lightcurve::write_json(path, self)?;
        Ok(())
    }
}

/// Project layout: `<root>/data` for tables, `<root>/plots` for figures.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDirs {
    root: PathBuf,
}

impl ProjectDirs {
    /// Root from `TRANSIT_ROOT`, else the current directory.
    pub fn discover() -> Self {
        let root = std::env::var_os(ROOT_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { root }
    }

    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.root.join("plots")
    }

    /// Create the data and plots directories.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.plots_dir())
    }
}

impl Default for ProjectDirs {
    fn default() -> Self {
        Self::discover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli() {
        let config = PipelineConfig::default();
        assert_eq!(config.download.mission, "TESS");
        assert_eq!(config.clean.sigma, 5.0);
        assert_eq!(config.detrend.window_length, 401);
        assert_eq!(config.detrend.polyorder, 2);
        assert_eq!(config.search.n_periods, 20000);
        assert_eq!(config.search.min_period, 0.5);
        assert_eq!(config.search.max_period, 10.0);
        assert_eq!(config.plot.bins, 200);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"search": {"max_period": 4.0}, "detrend": {"window_length": 101}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.search.max_period, 4.0);
        assert_eq!(config.search.min_period, 0.5);
        assert_eq!(config.detrend.window_length, 101);
        assert_eq!(config.clean, CleanConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg/pipeline.json");
        let mut config = PipelineConfig::default();
        config.search.objective = Objective::Snr;
        config.download.limit = Some(2);
        config.save_to_file(&path).unwrap();

        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_even_window_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"detrend": {"window_length": 400}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::load_from_file(&path),
            Err(TransitError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_project_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = ProjectDirs::with_root(dir.path());
        dirs.ensure().unwrap();
        assert!(dirs.data_dir().is_dir());
        assert!(dirs.plots_dir().is_dir());
        assert_eq!(dirs.plots_dir(), dir.path().join("plots"));
    }
}
