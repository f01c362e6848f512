//! Transit search for mission light curves.
//!
//! The pipeline mirrors how a single target is analysed by hand:
//!
//! 1. **clean** ([`clean`]): drop NaN cadences, sigma-clip outliers, normalise
//! 2. **detrend** ([`detrend`]): divide out stellar variability with an
//!    iterative Savitzky-Golay trend
//! 3. **search** ([`search`], [`bls`], [`grid`]): Box Least Squares over a
//!    period grid, best candidate by peak power
//! 4. **inspect** ([`fold`], [`plot`]): phase-fold on the best period and
//!    render PNG figures
//!
//! [`pipeline`] chains the stages with the file layout used by the command
//! line tools in `src/bin`, and [`config`] holds their parameters.

use thiserror::Error;

pub mod bls;
pub mod clean;
pub mod config;
pub mod detrend;
pub mod fold;
pub mod grid;
pub mod interp;
pub mod logging;
pub mod pipeline;
pub mod plot;
pub mod search;

pub use bls::{BlsPeriodogram, BlsStats, BoxLeastSquares, Objective};
pub use clean::{clean_lightcurve, sigma_clip, CleanReport};
pub use config::{
    CleanConfig, DetrendConfig, DownloadConfig, PipelineConfig, PlotConfig, ProjectDirs,
    SearchConfig,
};
pub use detrend::{flatten, savgol_filter, Flattened};
pub use fold::{bin_folded, fold, FoldedLightCurve};
pub use pipeline::{Pipeline, PipelineReport, Source};
pub use search::{run_bls, BlsSummary};

/// Errors raised by the transit search stages.
#[derive(Debug, Error)]
pub enum TransitError {
    #[error(transparent)]
    LightCurve(#[from] lightcurve::LightCurveError),

    /// Too few usable samples for the requested operation.
    #[error("Not enough valid points for {what}: need at least {needed}, found {found}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        found: usize,
    },

    /// Savitzky-Golay window/polynomial combination is unusable.
    #[error("invalid Savitzky-Golay window: {0}")]
    InvalidWindow(String),

    /// Period grid bounds or size are unusable.
    #[error("invalid period grid: {0}")]
    InvalidPeriodGrid(String),

    /// Every trial duration is at least as long as the shortest period.
    #[error("The maximum transit duration must be shorter than the minimum period: shortest duration {duration} >= period {period}")]
    DurationTooLong { duration: f64, period: f64 },

    /// Mean/standard deviation of the data are not finite.
    #[error("invalid statistics for sigma clipping: center={center}, std={std}")]
    InvalidStatistics { center: f64, std: f64 },

    /// Linear algebra failure while fitting polynomials.
    #[error("singular system while fitting polynomial of order {0}")]
    SingularFit(usize),

    #[error("plotting error: {0}")]
    Plot(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, TransitError>;
