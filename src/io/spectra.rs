//! Spectra JSON read/write.
//!
//! The file form is [`RawSpectra`]: units at the top level, an optional shared
//! `wave` array, and one record per epoch. Every field is optional on read so
//! that a missing array surfaces as a validation error naming the epoch.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use tracing::debug;

use crate::domain::{RawEpoch, RawSpectra, SpectralTimeSeries};
use crate::error::{Result, RvError};

/// Load and validate a spectra JSON file.
pub fn read_spectra_json(path: &Path) -> Result<SpectralTimeSeries> {
    let file = File::open(path)
        .map_err(|e| RvError::resource(format!("failed to open spectra '{}': {e}", path.display())))?;
    let spectra = parse_spectra_json(BufReader::new(file))?;
    debug!(path = %path.display(), epochs = spectra.len(), "loaded spectra");
    Ok(spectra)
}

pub fn parse_spectra_json<R: Read>(reader: R) -> Result<SpectralTimeSeries> {
    let raw: RawSpectra = serde_json::from_reader(reader)
        .map_err(|e| RvError::validation(format!("invalid spectra JSON: {e}")))?;
    SpectralTimeSeries::try_from(raw)
}

/// Write spectra in the same form [`read_spectra_json`] accepts.
///
/// When every epoch shares one wavelength grid it is written once at the top
/// level.
pub fn write_spectra_json(path: &Path, spectra: &SpectralTimeSeries) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| RvError::resource(format!("failed to create spectra '{}': {e}", path.display())))?;
    serde_json::to_writer(BufWriter::new(file), &to_raw(spectra))
        .map_err(|e| RvError::resource(format!("failed to write spectra JSON: {e}")))
}

fn to_raw(spectra: &SpectralTimeSeries) -> RawSpectra {
    let epochs = spectra.epochs();
    let shared = epochs.windows(2).all(|w| w[0].wave == w[1].wave);
    let units = spectra.units();
    RawSpectra {
        time_unit: units.time_unit.clone(),
        wave_unit: units.wave_unit.clone(),
        flux_unit: units.flux_unit.clone(),
        wave: shared.then(|| epochs[0].wave.clone()),
        epochs: epochs
            .iter()
            .map(|e| RawEpoch {
                time: Some(e.time),
                wave: (!shared).then(|| e.wave.clone()),
                flux_val: Some(e.flux_val.clone()),
                flux_err: Some(e.flux_err.clone()),
            })
            .collect(),
    }
}
