//! Box Least Squares periodogram.
//!
//! For every trial period the data are folded and accumulated into phase
//! bins `min(duration) / oversample` wide. Each trial duration then slides a
//! box over the bins (wrapping at phase 1) and keeps the box that maximises
//! the objective. Only dips are considered: boxes brighter than the
//! out-of-transit level are skipped.
//!
//! With inverse-variance weights `w`, in-transit weight `h_in`, out-of-transit
//! weight `h_out` and `depth = mean_out - mean_in`:
//!
//! ```text
//! log_likelihood = 0.5 * depth^2 * h_in * h_out / (h_in + h_out)
//! depth_err      = sqrt(1 / h_in + 1 / h_out)
//! depth_snr      = depth / depth_err
//! ```
//!
//! Periods are independent and evaluated in parallel with rayon.

use crate::fold::phase_of;
use crate::{Result, TransitError};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Minimum number of finite samples for a search.
pub const MIN_POINTS: usize = 10;

/// Quantity maximised over durations and phases for each period.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    LogLikelihood,
    Snr,
}

/// Best box found for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlsPeak {
    pub period: f64,
    pub power: f64,
    pub duration: f64,
    pub transit_time: f64,
    pub depth: f64,
    pub depth_err: f64,
    pub depth_snr: f64,
    pub log_likelihood: f64,
}

impl BlsPeak {
    fn empty(period: f64) -> Self {
        Self {
            period,
            power: 0.0,
            duration: f64::NAN,
            transit_time: f64::NAN,
            depth: f64::NAN,
            depth_err: f64::NAN,
            depth_snr: f64::NAN,
            log_likelihood: 0.0,
        }
    }
}

/// Periodogram columns, one entry per trial period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlsPeriodogram {
    pub objective: Objective,
    pub period: Vec<f64>,
    pub power: Vec<f64>,
    pub duration: Vec<f64>,
    pub transit_time: Vec<f64>,
    pub depth: Vec<f64>,
    pub depth_err: Vec<f64>,
    pub depth_snr: Vec<f64>,
    pub log_likelihood: Vec<f64>,
}

impl BlsPeriodogram {
    fn from_peaks(objective: Objective, peaks: Vec<BlsPeak>) -> Self {
        let mut pg = Self {
            objective,
            ..Default::default()
        };
        for p in peaks {
            pg.period.push(p.period);
            pg.power.push(p.power);
            pg.duration.push(p.duration);
            pg.transit_time.push(p.transit_time);
            pg.depth.push(p.depth);
            pg.depth_err.push(p.depth_err);
            pg.depth_snr.push(p.depth_snr);
            pg.log_likelihood.push(p.log_likelihood);
        }
        pg
    }

    pub fn len(&self) -> usize {
        self.period.len()
    }

    pub fn is_empty(&self) -> bool {
        self.period.is_empty()
    }

    /// Index of the maximum power, ignoring NaN.
    pub fn best_index(&self) -> Option<usize> {
        self.power
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_nan())
            .fold(None, |best: Option<(usize, f64)>, (i, &p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .map(|(i, _)| i)
    }

    /// Row at `index`.
    pub fn peak(&self, index: usize) -> Option<BlsPeak> {
        (index < self.len()).then(|| BlsPeak {
            period: self.period[index],
            power: self.power[index],
            duration: self.duration[index],
            transit_time: self.transit_time[index],
            depth: self.depth[index],
            depth_err: self.depth_err[index],
            depth_snr: self.depth_snr[index],
            log_likelihood: self.log_likelihood[index],
        })
    }

    /// Highest-power period.
    pub fn best(&self) -> Option<BlsPeak> {
        self.best_index().and_then(|i| self.peak(i))
    }
}

/// Diagnostics for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlsStats {
    pub depth: f64,
    pub depth_err: f64,
    /// Depth using only odd-numbered transits
    pub depth_odd: f64,
    pub depth_odd_err: f64,
    /// Depth using only even-numbered transits
    pub depth_even: f64,
    pub depth_even_err: f64,
    /// Mid-transit times covered by the data span
    pub transit_times: Vec<f64>,
    /// Samples inside each transit window
    pub per_transit_count: Vec<usize>,
}

/// Weighted in/out-of-transit fit for a box.
#[derive(Debug, Clone, Copy)]
struct BoxFit {
    depth: f64,
    depth_err: f64,
    mean_in: f64,
    mean_out: f64,
}

/// Box Least Squares search over one light curve.
#[derive(Debug, Clone)]
pub struct BoxLeastSquares {
    t: Vec<f64>,
    y: Vec<f64>,
    w: Vec<f64>,
    t_ref: f64,
}

impl BoxLeastSquares {
    /// Prepare a search on finite `(t, y)` samples.
    ///
    /// `dy` gives per-sample uncertainties (weights `1/dy^2`); samples with a
    /// missing or non-positive uncertainty get unit weight when `dy` is
    /// omitted and are dropped otherwise.
    pub fn new(t: &[f64], y: &[f64], dy: Option<&[f64]>) -> Result<Self> {
        if y.len() != t.len() || dy.is_some_and(|d| d.len() != t.len()) {
            return Err(TransitError::LightCurve(
                lightcurve::LightCurveError::LengthMismatch {
                    name: "flux",
                    expected: t.len(),
                    found: y.len(),
                },
            ));
        }

        let (mut ts, mut ys, mut ws) = (Vec::new(), Vec::new(), Vec::new());
        for i in 0..t.len() {
            if !t[i].is_finite() || !y[i].is_finite() {
                continue;
            }
            let w = match dy {
                Some(d) if d[i].is_finite() && d[i] > 0.0 => 1.0 / (d[i] * d[i]),
                Some(_) => continue,
                None => 1.0,
            };
            ts.push(t[i]);
            ys.push(y[i]);
            ws.push(w);
        }

        if ts.len() < MIN_POINTS {
            return Err(TransitError::InsufficientData {
                what: "BLS",
                needed: MIN_POINTS,
                found: ts.len(),
            });
        }

        let t_ref = ts.iter().copied().fold(f64::INFINITY, f64::min);
        Ok(Self {
            t: ts,
            y: ys,
            w: ws,
            t_ref,
        })
    }

    /// Number of samples used.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Evaluate the periodogram.
    ///
    /// Durations at least as long as a period are skipped for that period.
    ///
    /// # Arguments
    /// * `periods` - Trial periods in days
    /// * `durations` - Trial transit durations in days
    /// * `objective` - Quantity maximised over durations and phases
    /// * `oversample` - Phase bins per shortest duration
    ///
    /// # Returns
    /// One [`BlsPeak`] row per trial period, in input order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use transit::{BoxLeastSquares, Objective};
    ///
    /// let t: Vec<f64> = (0..2000).map(|i| i as f64 * 0.01).collect();
    /// let y: Vec<f64> = t
    ///     .iter()
    ///     .map(|&ti| if ti % 2.5 < 0.1 { 0.99 } else { 1.0 })
    ///     .collect();
    /// let bls = BoxLeastSquares::new(&t, &y, None).unwrap();
    ///
    /// let periods: Vec<f64> = (0..200).map(|i| 2.0 + i as f64 * 0.005).collect();
    /// let result = bls
    ///     .power(&periods, &[0.05, 0.1], Objective::LogLikelihood, 10)
    ///     .unwrap();
    /// let best = result.best().unwrap();
    /// assert!((best.period - 2.5).abs() < 0.01);
    /// ```
    ///
    /// # Errors
    /// - [`TransitError::InvalidPeriodGrid`] for empty or non-positive periods
    /// - [`TransitError::InvalidConfig`] for empty or non-positive durations
    ///   or `oversample == 0`
    /// - [`TransitError::DurationTooLong`] when the shortest duration is not
    ///   shorter than the shortest period
    pub fn power(
        &self,
        periods: &[f64],
        durations: &[f64],
        objective: Objective,
        oversample: usize,
    ) -> Result<BlsPeriodogram> {
        if periods.is_empty() || periods.iter().any(|p| !(*p > 0.0) || !p.is_finite()) {
            return Err(TransitError::InvalidPeriodGrid(
                "periods must be positive and finite".to_string(),
            ));
        }
        if durations.is_empty() || durations.iter().any(|d| !(*d > 0.0) || !d.is_finite()) {
            return Err(TransitError::InvalidConfig(
                "durations must be positive and finite".to_string(),
            ));
        }
        if oversample == 0 {
            return Err(TransitError::InvalidConfig(
                "oversample must be at least 1".to_string(),
            ));
        }

        let min_period = periods.iter().copied().fold(f64::INFINITY, f64::min);
        let min_duration = durations.iter().copied().fold(f64::INFINITY, f64::min);
        if min_duration >= min_period {
            return Err(TransitError::DurationTooLong {
                duration: min_duration,
                period: min_period,
            });
        }

        let bin_duration = min_duration / oversample as f64;
        debug!(
            "BLS: {} samples, {} periods, {} durations, bin width {bin_duration:.6} d",
            self.len(),
            periods.len(),
            durations.len()
        );

        let peaks: Vec<BlsPeak> = periods
            .par_iter()
            .map(|&p| self.evaluate_period(p, durations, bin_duration, objective))
            .collect();

        Ok(BlsPeriodogram::from_peaks(objective, peaks))
    }

    fn evaluate_period(
        &self,
        period: f64,
        durations: &[f64],
        bin_duration: f64,
        objective: Objective,
    ) -> BlsPeak {
        let n_bins = (period / bin_duration).floor() as usize + 1;

        let mut bin_wy = vec![0.0; n_bins];
        let mut bin_w = vec![0.0; n_bins];
        for ((&t, &y), &w) in self.t.iter().zip(&self.y).zip(&self.w) {
            let phase = (t - self.t_ref).rem_euclid(period);
            let idx = ((phase / bin_duration) as usize).min(n_bins - 1);
            bin_wy[idx] += w * y;
            bin_w[idx] += w;
        }
        let sum_wy: f64 = bin_wy.iter().sum();
        let sum_w: f64 = bin_w.iter().sum();

        // prefix sums over the bins repeated twice so boxes can wrap
        let mut cum_wy = vec![0.0; 2 * n_bins + 1];
        let mut cum_w = vec![0.0; 2 * n_bins + 1];
        for i in 0..2 * n_bins {
            cum_wy[i + 1] = cum_wy[i] + bin_wy[i % n_bins];
            cum_w[i + 1] = cum_w[i] + bin_w[i % n_bins];
        }

        let mut best = BlsPeak::empty(period);
        for &duration in durations.iter().filter(|&&d| d < period) {
            let width = ((duration / bin_duration).round() as usize).clamp(1, n_bins - 1);
            for start in 0..n_bins {
                let h_in = cum_w[start + width] - cum_w[start];
                let h_out = sum_w - h_in;
                if h_in <= 0.0 || h_out <= 0.0 {
                    continue;
                }
                let wy_in = cum_wy[start + width] - cum_wy[start];
                let mean_in = wy_in / h_in;
                let mean_out = (sum_wy - wy_in) / h_out;
                let depth = mean_out - mean_in;
                if depth <= 0.0 {
                    continue;
                }

                let log_likelihood = 0.5 * depth * depth * h_in * h_out / (h_in + h_out);
                let depth_err = (1.0 / h_in + 1.0 / h_out).sqrt();
                let depth_snr = depth / depth_err;
                let power = match objective {
                    Objective::LogLikelihood => log_likelihood,
                    Objective::Snr => depth_snr,
                };
                if power > best.power {
                    let mid = (start as f64 + 0.5 * width as f64) * bin_duration;
                    best = BlsPeak {
                        period,
                        power,
                        duration,
                        transit_time: self.t_ref + mid.rem_euclid(period),
                        depth,
                        depth_err,
                        depth_snr,
                        log_likelihood,
                    };
                }
            }
        }
        best
    }

    /// Phase offset of `t` from the nearest transit, in days.
    fn phase_offset(t: f64, period: f64, transit_time: f64) -> f64 {
        phase_of(t, period, transit_time) * period
    }

    /// Weighted box fit where `in_transit` marks in-transit samples and
    /// `include` restricts which in-transit samples count.
    fn box_fit<F: Fn(usize) -> bool>(&self, in_transit: &[bool], include: F) -> BoxFit {
        let (mut wy_in, mut w_in, mut wy_out, mut w_out) = (0.0, 0.0, 0.0, 0.0);
        for i in 0..self.len() {
            if in_transit[i] {
                if include(i) {
                    wy_in += self.w[i] * self.y[i];
                    w_in += self.w[i];
                }
            } else {
                wy_out += self.w[i] * self.y[i];
                w_out += self.w[i];
            }
        }
        let mean_in = if w_in > 0.0 { wy_in / w_in } else { f64::NAN };
        let mean_out = if w_out > 0.0 { wy_out / w_out } else { f64::NAN };
        BoxFit {
            depth: mean_out - mean_in,
            depth_err: (1.0 / w_in + 1.0 / w_out).sqrt(),
            mean_in,
            mean_out,
        }
    }

    fn in_transit_mask(&self, period: f64, duration: f64, transit_time: f64) -> Vec<bool> {
        self.t
            .iter()
            .map(|&t| Self::phase_offset(t, period, transit_time).abs() < 0.5 * duration)
            .collect()
    }

    /// Depth diagnostics and per-transit coverage for a candidate.
    pub fn compute_stats(&self, period: f64, duration: f64, transit_time: f64) -> Result<BlsStats> {
        if !(period > 0.0) || !(duration > 0.0) || duration >= period {
            return Err(TransitError::DurationTooLong { duration, period });
        }

        let in_transit = self.in_transit_mask(period, duration, transit_time);
        let epoch = |i: usize| ((self.t[i] - transit_time) / period).round() as i64;

        let all = self.box_fit(&in_transit, |_| true);
        let odd = self.box_fit(&in_transit, |i| epoch(i).rem_euclid(2) == 1);
        let even = self.box_fit(&in_transit, |i| epoch(i).rem_euclid(2) == 0);

        let t_min = self.t_ref;
        let t_max = self.t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let first = ((t_min - transit_time) / period).ceil() as i64;
        let last = ((t_max - transit_time) / period).floor() as i64;
        let transit_times: Vec<f64> = (first..=last)
            .map(|k| transit_time + k as f64 * period)
            .collect();

        let mut per_transit_count = vec![0usize; transit_times.len()];
        for i in (0..self.len()).filter(|&i| in_transit[i]) {
            let k = epoch(i) - first;
            if k >= 0 && (k as usize) < per_transit_count.len() {
                per_transit_count[k as usize] += 1;
            }
        }

        Ok(BlsStats {
            depth: all.depth,
            depth_err: all.depth_err,
            depth_odd: odd.depth,
            depth_odd_err: odd.depth_err,
            depth_even: even.depth,
            depth_even_err: even.depth_err,
            transit_times,
            per_transit_count,
        })
    }

    /// Best-fit box model evaluated at `t`.
    ///
    /// Levels are the weighted means of the data inside and outside the
    /// transit window.
    pub fn model(&self, t: &[f64], period: f64, duration: f64, transit_time: f64) -> Vec<f64> {
        let in_transit = self.in_transit_mask(period, duration, transit_time);
        let fit = self.box_fit(&in_transit, |_| true);
        t.iter()
            .map(|&ti| {
                if Self::phase_offset(ti, period, transit_time).abs() < 0.5 * duration {
                    fit.mean_in
                } else {
                    fit.mean_out
                }
            })
            .collect()
    }
}
