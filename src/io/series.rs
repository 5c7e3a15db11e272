//! RV series CSV read/write.
//!
//! Reading accepts either naming convention for the value columns
//! (`rv`/`rv_err` or `vrad_val`/`vrad_err`); `epoch` is optional and defaults
//! to the row index. Any unparseable row fails the whole read.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::domain::{RvProvenance, RvRun, RvSeries};
use crate::error::{Result, RvError};

/// Load an RV series from CSV.
pub fn read_rv_csv(path: &Path) -> Result<RvSeries> {
    let file = File::open(path)
        .map_err(|e| RvError::resource(format!("failed to open RV CSV '{}': {e}", path.display())))?;
    let series = parse_rv_csv(file)?;
    debug!(path = %path.display(), rows = series.len(), "loaded RV series");
    Ok(series)
}

pub fn parse_rv_csv<R: Read>(reader: R) -> Result<RvSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| RvError::validation(format!("failed to read RV CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let column = |names: &[&str]| -> Result<usize> {
        names
            .iter()
            .find_map(|n| header_map.get(*n).copied())
            .ok_or_else(|| RvError::validation(format!("RV CSV is missing column '{}'", names.join("' or '"))))
    };
    let time_idx = column(&["time"])?;
    let rv_idx = column(&["rv", "vrad_val"])?;
    let err_idx = column(&["rv_err", "vrad_err"])?;
    let epoch_idx = header_map.get("epoch").copied();

    let mut series = RvSeries {
        epoch: Vec::new(),
        time: Vec::new(),
        rv: Vec::new(),
        rv_err: Vec::new(),
        time_unit: None,
        rv_unit: "km/s".to_string(),
        provenance: RvProvenance {
            method: "csv".to_string(),
            ..RvProvenance::default()
        },
    };

    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record =
            record.map_err(|e| RvError::validation(format!("RV CSV line {line}: parse error: {e}")))?;
        let field = |i: usize, name: &str| -> Result<f64> {
            record
                .get(i)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .ok_or_else(|| RvError::validation(format!("RV CSV line {line}: invalid '{name}' value")))
        };
        let epoch = match epoch_idx {
            Some(i) => record
                .get(i)
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| RvError::validation(format!("RV CSV line {line}: invalid 'epoch' value")))?,
            None => idx,
        };
        series.epoch.push(epoch);
        series.time.push(field(time_idx, "time")?);
        series.rv.push(field(rv_idx, "rv")?);
        series.rv_err.push(field(err_idx, "rv_err")?);
    }

    if series.is_empty() {
        return Err(RvError::validation("RV CSV has no rows"));
    }
    Ok(series)
}

/// Write an RV run as CSV: one row per successful epoch, FWHM alongside.
pub fn write_rv_csv(path: &Path, run: &RvRun) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| RvError::resource(format!("failed to create RV CSV '{}': {e}", path.display())))?;

    writeln!(file, "epoch,time,rv,rv_err,fwhm")
        .map_err(|e| RvError::resource(format!("failed to write RV CSV header: {e}")))?;

    let rv = &run.rv;
    for i in 0..rv.len() {
        writeln!(
            file,
            "{},{},{:.10},{:.10},{:.10}",
            rv.epoch[i],
            rv.time[i],
            rv.rv[i],
            rv.rv_err[i],
            run.fwhm.fwhm.get(i).copied().unwrap_or(f64::NAN),
        )
        .map_err(|e| RvError::resource(format!("failed to write RV CSV row: {e}")))?;
    }
    Ok(())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), idx))
        .collect()
}
