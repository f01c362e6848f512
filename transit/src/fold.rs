//! Phase folding and binning.

use crate::{Result, TransitError};
use lightcurve::stats::nanmean;
use lightcurve::LightCurve;

/// Light curve folded on a period, sorted by phase.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldedLightCurve {
    /// Phase in cycles, in [-0.5, 0.5)
    pub phase: Vec<f64>,
    pub flux: Vec<f64>,
    pub period: f64,
    pub epoch: f64,
}

impl FoldedLightCurve {
    pub fn len(&self) -> usize {
        self.phase.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phase.is_empty()
    }
}

/// Binned folded curve: bin centres and mean flux per bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedFold {
    pub centers: Vec<f64>,
    /// NaN for empty bins
    pub flux: Vec<f64>,
}

/// Phase in cycles of `t`, wrapped to [-0.5, 0.5).
pub fn phase_of(t: f64, period: f64, epoch: f64) -> f64 {
    let cycles = ((t - epoch) / period + 0.5).rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if cycles >= 1.0 {
        -0.5
    } else {
        cycles - 0.5
    }
}

/// Fold on `period` so that `epoch` lands at phase 0.
///
/// `epoch` defaults to the first timestamp.
pub fn fold(lc: &LightCurve, period: f64, epoch: Option<f64>) -> Result<FoldedLightCurve> {
    if !(period > 0.0) || !period.is_finite() {
        return Err(TransitError::InvalidConfig(format!(
            "fold period must be positive, got {period}"
        )));
    }
    let epoch = match epoch {
        Some(e) => e,
        None => *lc.time.first().ok_or(TransitError::InsufficientData {
            what: "phase folding",
            needed: 1,
            found: 0,
        })?,
    };

    let mut pairs: Vec<(f64, f64)> = lc
        .time
        .iter()
        .zip(lc.flux.iter())
        .map(|(&t, &f)| (phase_of(t, period, epoch), f))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (phase, flux) = pairs.into_iter().unzip();

    Ok(FoldedLightCurve {
        phase,
        flux,
        period,
        epoch,
    })
}

/// Mean flux in equal-width phase bins.
///
/// `n_edges` edges span [-0.5, 0.5], giving `n_edges - 1` bins; the last
/// bin includes its right edge.
pub fn bin_folded(folded: &FoldedLightCurve, n_edges: usize) -> Result<BinnedFold> {
    if n_edges < 2 {
        return Err(TransitError::InvalidConfig(format!(
            "need at least 2 bin edges, got {n_edges}"
        )));
    }
    let n_bins = n_edges - 1;
    let width = 1.0 / n_bins as f64;

    let mut members: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
    for (&p, &f) in folded.phase.iter().zip(&folded.flux) {
        if !(-0.5..=0.5).contains(&p) {
            continue;
        }
        let idx = (((p + 0.5) / width) as usize).min(n_bins - 1);
        members[idx].push(f);
    }

    let centers = (0..n_bins)
        .map(|i| -0.5 + (i as f64 + 0.5) * width)
        .collect();
    let flux = members.iter().map(|m| nanmean(m)).collect();
    Ok(BinnedFold { centers, flux })
}
