//! Result exports.
//!
//! JSON exports share one envelope, `{ "tool", "generated", ...body }`, so a
//! file can be traced back to the run that produced it. The fit export also
//! carries the fitted model evaluated on the frequencies it was fitted to,
//! ready for plotting.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{FitResult, FitTarget, LineMask, RvRun, Vpsd};
use crate::error::{Result, RvError};
use crate::models::{evaluate_components, evaluate_total};

/// Name written into every export envelope.
pub const TOOL: &str = "rvs";

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    tool: &'static str,
    generated: DateTime<Utc>,
    #[serde(flatten)]
    body: &'a T,
}

/// Fitted model sampled on the fit's frequency grid.
#[derive(Debug, Clone, Serialize)]
pub struct ModelGrid {
    pub frequency: Vec<f64>,
    pub total: Vec<f64>,
    /// One row per component, in input order.
    pub components: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize)]
struct FitExport<'a> {
    fit: &'a FitResult,
    model: ModelGrid,
}

/// Sample the fitted components on the frequencies the fit used.
pub fn model_grid(fit: &FitResult, vpsd: &Vpsd) -> Result<ModelGrid> {
    let frequency = match fit.target {
        FitTarget::Full => vpsd.frequency.clone(),
        FitTarget::Binned => vpsd.freq_avg.clone(),
    };
    Ok(ModelGrid {
        total: evaluate_total(&fit.components, &frequency)?,
        components: evaluate_components(&fit.components, &frequency)?,
        frequency,
    })
}

pub fn write_rv_json(path: &Path, run: &RvRun) -> Result<()> {
    write_envelope(path, run)
}

pub fn write_vpsd_json(path: &Path, vpsd: &Vpsd) -> Result<()> {
    write_envelope(path, vpsd)
}

pub fn write_fit_json(path: &Path, fit: &FitResult, vpsd: &Vpsd) -> Result<()> {
    let body = FitExport {
        fit,
        model: model_grid(fit, vpsd)?,
    };
    write_envelope(path, &body)
}

/// Write a line mask as `wave,weight` CSV (readable with a `weight` column).
pub fn write_mask_csv(path: &Path, mask: &LineMask) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| RvError::resource(format!("failed to create mask CSV '{}': {e}", path.display())))?;

    writeln!(file, "wave,weight")
        .map_err(|e| RvError::resource(format!("failed to write mask CSV header: {e}")))?;
    for line in &mask.lines {
        writeln!(file, "{:.6},{:.6}", line.wave, line.weight)
            .map_err(|e| RvError::resource(format!("failed to write mask CSV row: {e}")))?;
    }
    Ok(())
}

fn write_envelope<T: Serialize>(path: &Path, body: &T) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| RvError::resource(format!("failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &envelope(body))
        .map_err(|e| RvError::resource(format!("failed to write JSON export '{}': {e}", path.display())))
}

fn envelope<T: Serialize>(body: &T) -> Envelope<'_, T> {
    Envelope {
        tool: TOOL,
        generated: Utc::now(),
        body,
    }
}
