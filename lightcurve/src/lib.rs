//! Light curve data model and data access for transit searches.
//!
//! This crate holds everything that touches light-curve *data* rather than
//! transit *analysis*:
//!
//! - [`model`]: the [`LightCurve`] time series (time, flux, flux uncertainty)
//!   with NaN removal, masking, normalisation and concatenation
//! - [`stats`]: NaN-aware median, mean, standard deviation and MAD
//! - [`io`]: CSV and (with the `fits` feature) FITS readers/writers plus JSON
//!   summary helpers
//! - [`archive`]: a blocking client for the MAST portal API used to find and
//!   download TESS light curves, and sector stitching
//!
//! Timestamps are kept in whatever system the source uses (BTJD for TESS
//! products); nothing in this crate converts time scales.

use thiserror::Error;

pub mod archive;
pub mod io;
pub mod model;
pub mod stats;

pub use archive::{search_and_download, stitch, MastClient, SearchResult};
pub use io::{load_lightcurve, read_json, save_lightcurve, write_json};
pub use model::{LightCurve, LightCurveMeta};

/// Errors raised while building, reading or fetching light curves.
#[derive(Debug, Error)]
pub enum LightCurveError {
    /// Column arrays disagree in length.
    #[error("column length mismatch: {name} has {found} samples, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    /// Input file does not exist.
    #[error("file not found: {0}")]
    NotFound(std::path::PathBuf),

    /// File extension has no reader.
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    /// A required column is absent from the input table.
    #[error("{0}")]
    MissingColumn(String),

    /// Normalisation by the median flux is undefined.
    #[error("cannot normalize light curve: median flux is {0}")]
    InvalidNormalization(f64),

    /// Statistic requested on data without any valid value.
    #[error("Insufficient data points to compute {what}: {total} total values, 0 valid")]
    NoValidData { what: &'static str, total: usize },

    /// The archive query returned nothing for the target.
    #[error("No lightcurve results for {0}")]
    NoResults(String),

    /// Error talking to or parsing a response from the archive.
    #[error("archive error: {0}")]
    Archive(String),

    /// Support for a format was not compiled in.
    #[error("{0} support not enabled (rebuild with the `{1}` feature)")]
    FeatureDisabled(&'static str, &'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "fits")]
    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, LightCurveError>;
