//! Light curve time series.
//!
//! A [`LightCurve`] is three equal-length columns (time, flux, flux
//! uncertainty) plus a little provenance metadata. Operations that drop
//! samples always return a new curve so every column stays aligned.

use crate::stats::nanmedian;
use crate::{LightCurveError, Result};
use log::warn;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Provenance of a light curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurveMeta {
    /// Target name as searched or as found in the file header
    pub target: Option<String>,
    /// Mission the data came from (e.g. "TESS")
    pub mission: Option<String>,
    /// Observing sector
    pub sector: Option<i64>,
    /// Column the flux was read from (e.g. "PDCSAP_FLUX")
    pub flux_column: Option<String>,
}

/// Time series of flux measurements for one star.
///
/// `flux_err` holds NaN wherever the uncertainty is unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct LightCurve {
    pub time: Array1<f64>,
    pub flux: Array1<f64>,
    pub flux_err: Array1<f64>,
    pub meta: LightCurveMeta,
}

impl LightCurve {
    /// Build a light curve from its three columns.
    pub fn new(time: Array1<f64>, flux: Array1<f64>, flux_err: Array1<f64>) -> Result<Self> {
        let expected = time.len();
        if flux.len() != expected {
            return Err(LightCurveError::LengthMismatch {
                name: "flux",
                expected,
                found: flux.len(),
            });
        }
        if flux_err.len() != expected {
            return Err(LightCurveError::LengthMismatch {
                name: "flux_err",
                expected,
                found: flux_err.len(),
            });
        }
        Ok(Self {
            time,
            flux,
            flux_err,
            meta: LightCurveMeta::default(),
        })
    }

    /// Build a light curve with unknown uncertainties.
    pub fn from_time_flux(time: Vec<f64>, flux: Vec<f64>) -> Result<Self> {
        let n = time.len();
        Self::new(
            Array1::from(time),
            Array1::from(flux),
            Array1::from_elem(n, f64::NAN),
        )
    }

    /// Attach metadata.
    pub fn with_meta(mut self, meta: LightCurveMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// True when at least one sample carries a finite uncertainty.
    pub fn has_flux_err(&self) -> bool {
        self.flux_err.iter().any(|e| e.is_finite())
    }

    /// Span between the first and last finite timestamp.
    pub fn time_span(&self) -> f64 {
        let (min, max) = self
            .time
            .iter()
            .filter(|t| t.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            });
        if min.is_finite() {
            max - min
        } else {
            0.0
        }
    }

    /// Median positive step between consecutive timestamps, NaN when undefined.
    pub fn cadence(&self) -> f64 {
        let steps: Vec<f64> = self
            .time
            .windows(2)
            .into_iter()
            .map(|w| w[1] - w[0])
            .filter(|dt| dt.is_finite() && *dt > 0.0)
            .collect();
        nanmedian(&steps)
    }

    /// Keep the samples where `mask` is true.
    pub fn select(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(LightCurveError::LengthMismatch {
                name: "mask",
                expected: self.len(),
                found: mask.len(),
            });
        }
        Ok(self.filter_by(mask))
    }

    fn filter_by(&self, mask: &[bool]) -> Self {
        let pick = |col: &Array1<f64>| -> Array1<f64> {
            col.iter()
                .zip(mask)
                .filter(|(_, &keep)| keep)
                .map(|(&v, _)| v)
                .collect()
        };
        Self {
            time: pick(&self.time),
            flux: pick(&self.flux),
            flux_err: pick(&self.flux_err),
            meta: self.meta.clone(),
        }
    }

    /// Drop samples whose time or flux is not finite.
    ///
    /// Unknown (NaN) uncertainties do not cause a sample to be dropped.
    pub fn remove_nans(&self) -> Self {
        let mask: Vec<bool> = self
            .time
            .iter()
            .zip(self.flux.iter())
            .map(|(t, f)| t.is_finite() && f.is_finite())
            .collect();
        self.filter_by(&mask)
    }

    /// Divide flux and uncertainty by the median flux.
    pub fn normalize(&self) -> Result<Self> {
        let median = nanmedian(&self.flux.to_vec());
        if !median.is_finite() || median == 0.0 {
            return Err(LightCurveError::InvalidNormalization(median));
        }
        if median < 0.0 {
            warn!("Median flux is negative ({median}); normalized light curve will be inverted");
        }
        Ok(Self {
            time: self.time.clone(),
            flux: &self.flux / median,
            flux_err: &self.flux_err / median,
            meta: self.meta.clone(),
        })
    }

    /// Return a copy ordered by ascending time.
    pub fn sort_by_time(&self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.time[a].total_cmp(&self.time[b]));
        let take = |col: &Array1<f64>| -> Array1<f64> { order.iter().map(|&i| col[i]).collect() };
        Self {
            time: take(&self.time),
            flux: take(&self.flux),
            flux_err: take(&self.flux_err),
            meta: self.meta.clone(),
        }
    }

    /// Concatenate `other` after `self`, keeping this curve's metadata.
    pub fn append(&self, other: &LightCurve) -> Self {
        let join = |a: &Array1<f64>, b: &Array1<f64>| -> Array1<f64> {
            a.iter().chain(b.iter()).copied().collect()
        };
        Self {
            time: join(&self.time, &other.time),
            flux: join(&self.flux, &other.flux),
            flux_err: join(&self.flux_err, &other.flux_err),
            meta: self.meta.clone(),
        }
    }
}
