//! Per-epoch CCF + RV extraction over a whole spectral time series.
//!
//! The mask is filtered once against the wavelength range shared by all
//! epochs, then every epoch is processed independently (optionally in
//! parallel). Results are keyed by epoch index, so their order never depends
//! on completion order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ccf::builder::build_ccf;
use crate::ccf::extract::extract_moments;
use crate::ccf::mask::filter_mask;
use crate::domain::{
    CcfMoments, EpochFailure, FwhmSeries, LineMask, RvProvenance, RvRun, RvSeries, SpectralTimeSeries,
    VelocityGrid,
};
use crate::error::{Result, RvError};
use crate::math::LmOptions;

/// What to do when one epoch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpochErrorPolicy {
    /// Stop and return the failing epoch's error.
    Abort,
    /// Record the failure and leave the epoch out of the series.
    Skip,
}

/// Options for [`compute_rv_series`].
#[derive(Debug, Clone)]
pub struct RvOptions {
    pub parallel: bool,
    pub on_epoch_error: EpochErrorPolicy,
    pub lm: LmOptions,
}

impl RvOptions {
    pub fn new(on_epoch_error: EpochErrorPolicy) -> Self {
        Self {
            parallel: false,
            on_epoch_error,
            lm: LmOptions::default(),
        }
    }
}

/// Receives progress notifications from the epoch loop.
///
/// Called from worker threads when running in parallel.
pub trait ProgressObserver: Sync {
    fn on_epoch_done(&self, epoch: usize, completed: usize, total: usize, ok: bool);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_epoch_done(&self, _epoch: usize, _completed: usize, _total: usize, _ok: bool) {}
}

/// Cooperative cancellation flag, checked before each epoch starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum EpochOutcome {
    Done(CcfMoments),
    Failed(RvError),
    Cancelled,
}

/// Compute RV and FWHM series for every epoch.
///
/// Fails before any epoch is processed when the mask has no usable lines.
pub fn compute_rv_series(
    spectra: &SpectralTimeSeries,
    mask: &LineMask,
    grid: &VelocityGrid,
    opts: &RvOptions,
    progress: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<RvRun> {
    let overlap = spectra.wave_overlap().ok_or_else(|| {
        RvError::domain(format!(
            "the {} epochs share no common wavelength range",
            spectra.len()
        ))
    })?;
    let filtered = filter_mask(mask, overlap, grid)?;
    info!(
        mask = %mask.id,
        lines_in = mask.lines.len(),
        lines_kept = filtered.lines.len(),
        epochs = spectra.len(),
        "computing CCF radial velocities"
    );

    let total = spectra.len();
    let completed = AtomicUsize::new(0);
    let run_epoch = |i: usize| -> EpochOutcome {
        if cancel.is_cancelled() {
            return EpochOutcome::Cancelled;
        }
        let epoch = &spectra.epochs()[i];
        let outcome = build_ccf(epoch, &filtered, grid).and_then(|ccf| extract_moments(&ccf, &opts.lm));
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        progress.on_epoch_done(i, done, total, outcome.is_ok());
        match outcome {
            Ok(m) => EpochOutcome::Done(m),
            Err(e) => EpochOutcome::Failed(e),
        }
    };

    let outcomes: Vec<EpochOutcome> = if opts.parallel {
        (0..total).into_par_iter().map(run_epoch).collect()
    } else {
        let mut out = Vec::with_capacity(total);
        for i in 0..total {
            let outcome = run_epoch(i);
            let stop = match &outcome {
                EpochOutcome::Cancelled => true,
                EpochOutcome::Failed(_) => opts.on_epoch_error == EpochErrorPolicy::Abort,
                EpochOutcome::Done(_) => false,
            };
            out.push(outcome);
            if stop {
                break;
            }
        }
        out
    };

    let mut times = Vec::new();
    let mut epochs = Vec::new();
    let mut rv = Vec::new();
    let mut rv_err = Vec::new();
    let mut fwhm = Vec::new();
    let mut failures = Vec::new();

    for (i, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            EpochOutcome::Done(m) => {
                debug!(epoch = i, rv = m.rv, rv_err = m.rv_err, fwhm = m.fwhm, "epoch done");
                epochs.push(i);
                times.push(spectra.epochs()[i].time);
                rv.push(m.rv);
                rv_err.push(m.rv_err);
                fwhm.push(m.fwhm);
            }
            EpochOutcome::Failed(e) => match opts.on_epoch_error {
                EpochErrorPolicy::Abort => return Err(e.at_epoch(i)),
                EpochErrorPolicy::Skip => {
                    warn!(epoch = i, error = %e, "skipping epoch");
                    failures.push(EpochFailure {
                        epoch: i,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            },
            EpochOutcome::Cancelled => {
                return Err(RvError::Cancelled {
                    completed: completed.load(Ordering::SeqCst),
                    total,
                });
            }
        }
    }

    if epochs.is_empty() {
        return Err(RvError::fit(format!("all {total} epochs failed")));
    }

    let time_unit = spectra.units().time_unit.clone();
    let provenance = RvProvenance {
        method: "CCF".to_string(),
        mask: Some(mask.id.clone()),
        velocity_grid: Some([grid.start, grid.stop, grid.step]),
        mask_lines: Some(filtered.lines.len()),
    };

    Ok(RvRun {
        rv: RvSeries {
            epoch: epochs.clone(),
            time: times.clone(),
            rv,
            rv_err,
            time_unit,
            rv_unit: "km/s".to_string(),
            provenance,
        },
        fwhm: FwhmSeries {
            epoch: epochs,
            time: times,
            fwhm,
            unit: "km/s".to_string(),
        },
        failures,
    })
}
