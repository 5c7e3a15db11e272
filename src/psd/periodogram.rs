//! Periodogram engine contract and the default generalized Lomb–Scargle engine.
//!
//! The VPSD builder only depends on [`PeriodogramEngine`]; any estimator that
//! returns power, phase and (optionally) the spectral window can be plugged in.

use std::f64::consts::TAU;

use crate::domain::PeriodogramResult;
use crate::error::{Result, RvError};
use crate::math::{median, trapezoid};

/// Frequency-domain power estimator for (unevenly sampled) time series.
pub trait PeriodogramEngine {
    /// `error` may be `None` for unweighted data. With `normalize = false` the
    /// power is in squared data units. With `window = true` the spectral
    /// window of the sampling and its area are returned as well.
    fn periodogram(
        &self,
        time: &[f64],
        value: &[f64],
        error: Option<&[f64]>,
        normalize: bool,
        window: bool,
    ) -> Result<PeriodogramResult>;
}

/// Generalized Lomb–Scargle periodogram (floating mean, error weights).
#[derive(Debug, Clone)]
pub struct GlsPeriodogram {
    /// Frequency spacing is `1 / (baseline · oversampling)`.
    pub oversampling: f64,
    /// Lowest frequency; defaults to `1 / baseline`.
    pub f_min: Option<f64>,
    /// Highest frequency; defaults to `0.5 / median(Δt)`.
    pub f_max: Option<f64>,
}

impl Default for GlsPeriodogram {
    fn default() -> Self {
        Self {
            oversampling: 10.0,
            f_min: None,
            f_max: None,
        }
    }
}

impl GlsPeriodogram {
    fn frequency_grid(&self, time: &[f64]) -> Result<(Vec<f64>, f64)> {
        let (t0, t1) = time
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
        let baseline = t1 - t0;
        if !(baseline.is_finite() && baseline > 0.0) {
            return Err(RvError::domain(format!("time baseline is {baseline}, need > 0")));
        }

        let mut sorted = time.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let dts: Vec<f64> = sorted.windows(2).map(|w| w[1] - w[0]).filter(|d| *d > 0.0).collect();
        let median_dt = median(&dts).unwrap_or(baseline);

        let f_min = self.f_min.unwrap_or(1.0 / baseline);
        let f_max = self.f_max.unwrap_or(0.5 / median_dt);
        if !(self.oversampling.is_finite() && self.oversampling > 0.0) {
            return Err(RvError::validation(format!(
                "oversampling must be positive, got {}",
                self.oversampling
            )));
        }
        if !(f_min.is_finite() && f_max.is_finite() && f_min > 0.0 && f_max > f_min) {
            return Err(RvError::domain(format!(
                "invalid frequency range [{f_min}, {f_max}]"
            )));
        }

        let df = (1.0 / baseline) / self.oversampling;
        let n = ((f_max - f_min) / df).floor() as usize + 1;
        Ok(((0..n).map(|i| f_min + i as f64 * df).collect(), df))
    }
}

impl PeriodogramEngine for GlsPeriodogram {
    fn periodogram(
        &self,
        time: &[f64],
        value: &[f64],
        error: Option<&[f64]>,
        normalize: bool,
        window: bool,
    ) -> Result<PeriodogramResult> {
        let n = time.len();
        if value.len() != n || error.is_some_and(|e| e.len() != n) {
            return Err(RvError::validation(format!(
                "periodogram inputs differ in length (time={n}, value={}, error={})",
                value.len(),
                error.map_or(n, |e| e.len())
            )));
        }
        if n < 3 {
            return Err(RvError::domain(format!("periodogram needs at least 3 points, got {n}")));
        }
        if time.iter().chain(value).any(|v| !v.is_finite()) {
            return Err(RvError::validation("periodogram inputs contain non-finite values"));
        }

        let weights = normalized_weights(error, n);
        let (frequency, df) = self.frequency_grid(time)?;

        let y_mean: f64 = weights.iter().zip(value).map(|(w, y)| w * y).sum();
        let yy: f64 = weights
            .iter()
            .zip(value)
            .map(|(w, y)| w * (y - y_mean) * (y - y_mean))
            .sum();

        let mut power = Vec::with_capacity(frequency.len());
        let mut phase = Vec::with_capacity(frequency.len());
        for &f in &frequency {
            let (p, ph) = gls_at(time, value, &weights, y_mean, yy, f);
            power.push(if normalize { p } else { p * yy });
            phase.push(ph);
        }

        let (window_frequency, window_power, window_area) = if window {
            let f_max = frequency[frequency.len() - 1];
            let m = (f_max / df).floor() as usize + 1;
            let wf: Vec<f64> = (0..m).map(|i| i as f64 * df).collect();
            let wp: Vec<f64> = wf.iter().map(|&f| spectral_window(time, &weights, f)).collect();
            let area = trapezoid(&wf, &wp);
            (wf, wp, area)
        } else {
            (Vec::new(), Vec::new(), f64::NAN)
        };

        Ok(PeriodogramResult {
            frequency,
            power,
            phase,
            window_frequency,
            window_power,
            window_area,
        })
    }
}

/// Weights `1/σ²` normalized to sum 1; uniform when any error is unusable.
fn normalized_weights(error: Option<&[f64]>, n: usize) -> Vec<f64> {
    let usable = error.filter(|e| e.iter().all(|v| v.is_finite() && *v > 0.0));
    let raw: Vec<f64> = match usable {
        Some(e) => e.iter().map(|v| 1.0 / (v * v)).collect(),
        None => vec![1.0; n],
    };
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Normalized GLS power and phase at one frequency.
fn gls_at(time: &[f64], value: &[f64], w: &[f64], y_mean: f64, yy: f64, f: f64) -> (f64, f64) {
    let omega = TAU * f;
    let (mut c, mut s, mut cc, mut cs, mut yc, mut ys) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for i in 0..time.len() {
        let (sin, cos) = (omega * time[i]).sin_cos();
        let y = value[i] - y_mean;
        c += w[i] * cos;
        s += w[i] * sin;
        cc += w[i] * cos * cos;
        cs += w[i] * cos * sin;
        yc += w[i] * y * cos;
        ys += w[i] * y * sin;
    }
    let ss = 1.0 - cc - s * s;
    let cc = cc - c * c;
    let cs = cs - c * s;
    // `y` is already centred, so YC and YS need no mean correction.
    let d = cc * ss - cs * cs;
    if !(d > 0.0 && yy > 0.0) {
        return (0.0, 0.0);
    }
    let p = (ss * yc * yc + cc * ys * ys - 2.0 * cs * yc * ys) / (yy * d);
    let a = (yc * ss - ys * cs) / d;
    let b = (ys * cc - yc * cs) / d;
    (p.clamp(0.0, 1.0), b.atan2(a))
}

/// `|Σ w_i exp(2πi f t_i)|²` with weights summing to 1.
fn spectral_window(time: &[f64], w: &[f64], f: f64) -> f64 {
    let omega = TAU * f;
    let (mut re, mut im) = (0.0, 0.0);
    for (t, wi) in time.iter().zip(w) {
        let (sin, cos) = (omega * t).sin_cos();
        re += wi * cos;
        im += wi * sin;
    }
    re * re + im * im
}
