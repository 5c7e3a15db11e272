//! Velocity power spectral density.
//!
//! The RV series goes through the periodogram engine (unnormalized power,
//! spectral window on). The power is then:
//!
//! - averaged in 50 log-spaced frequency bins spanning the periodogram range
//!   (a frequency belongs to a bin when strictly inside its edges; empty bins
//!   are dropped)
//! - divided by the spectral-window area, at full resolution and binned
//!
//! The result is a pure function of the periodogram output.

use tracing::debug;

use crate::domain::{PeriodogramResult, RvSeries, Vpsd};
use crate::error::{Result, RvError};
use crate::math::linspace;
use crate::psd::periodogram::PeriodogramEngine;

/// Number of log-spaced averaging bins.
pub const VPSD_BINS: usize = 50;

/// `n + 1` log-spaced edges from `f_lo` to `f_hi`.
pub fn log_bin_edges(f_lo: f64, f_hi: f64, n: usize) -> Vec<f64> {
    linspace(f_lo.log10(), f_hi.log10(), n + 1)
        .into_iter()
        .map(|e| 10f64.powf(e))
        .collect()
}

/// Run the periodogram engine on an RV series and build its VPSD.
pub fn compute_vpsd(rv: &RvSeries, engine: &dyn PeriodogramEngine) -> Result<Vpsd> {
    if rv.len() != rv.rv.len() || rv.len() != rv.rv_err.len() {
        return Err(RvError::validation(format!(
            "RV series arrays differ in length (time={}, rv={}, rv_err={})",
            rv.len(),
            rv.rv.len(),
            rv.rv_err.len()
        )));
    }
    let periodogram = engine.periodogram(&rv.time, &rv.rv, Some(&rv.rv_err), false, true)?;
    vpsd_from_periodogram(&periodogram)
}

/// Build the VPSD from a periodogram computed with the spectral window.
pub fn vpsd_from_periodogram(pg: &PeriodogramResult) -> Result<Vpsd> {
    validate_periodogram(pg)?;

    let freq = &pg.frequency;
    let edges = log_bin_edges(freq[0], freq[freq.len() - 1], VPSD_BINS);

    let mut freq_avg = Vec::with_capacity(VPSD_BINS);
    let mut power_avg = Vec::with_capacity(VPSD_BINS);
    let mut bin_lo = Vec::with_capacity(VPSD_BINS);
    let mut bin_hi = Vec::with_capacity(VPSD_BINS);

    for w in edges.windows(2) {
        let (lo, hi) = (w[0], w[1]);
        let (sum, count) = freq
            .iter()
            .zip(&pg.power)
            .filter(|(f, _)| **f > lo && **f < hi)
            .fold((0.0, 0usize), |(s, c), (_, p)| (s + p, c + 1));
        if count == 0 {
            continue;
        }
        freq_avg.push((lo + hi) / 2.0);
        power_avg.push(sum / count as f64);
        bin_lo.push(lo);
        bin_hi.push(hi);
    }
    debug!(bins = freq_avg.len(), of = VPSD_BINS, "log-binned VPSD");

    let area = pg.window_area;
    Ok(Vpsd {
        frequency: freq.clone(),
        power: pg.power.clone(),
        density: pg.power.iter().map(|p| p / area).collect(),
        phase: pg.phase.clone(),
        freq_avg,
        density_avg: power_avg.iter().map(|p| p / area).collect(),
        power_avg,
        bin_lo,
        bin_hi,
        window_area: area,
    })
}

fn validate_periodogram(pg: &PeriodogramResult) -> Result<()> {
    let n = pg.frequency.len();
    if n == 0 {
        return Err(RvError::validation("periodogram is empty"));
    }
    if pg.power.len() != n || pg.phase.len() != n {
        return Err(RvError::validation(format!(
            "periodogram arrays differ in length (frequency={n}, power={}, phase={})",
            pg.power.len(),
            pg.phase.len()
        )));
    }
    if !(pg.frequency[0].is_finite() && pg.frequency[0] > 0.0) {
        return Err(RvError::domain(format!(
            "periodogram frequencies must be positive for log binning, first is {}",
            pg.frequency[0]
        )));
    }
    if let Some(i) = pg.frequency.windows(2).position(|w| !(w[1] > w[0])) {
        return Err(RvError::validation(format!(
            "periodogram frequencies must be strictly increasing (index {})",
            i + 1
        )));
    }
    if let Some(i) = pg.power.iter().position(|p| !(p.is_finite() && *p >= 0.0)) {
        return Err(RvError::validation(format!(
            "periodogram power must be finite and non-negative (index {i} is {})",
            pg.power[i]
        )));
    }
    if !(pg.window_area.is_finite() && pg.window_area > 0.0) {
        return Err(RvError::domain(format!(
            "spectral window area must be positive, got {}",
            pg.window_area
        )));
    }
    Ok(())
}
