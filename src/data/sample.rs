//! Synthetic spectral time series for demos and end-to-end tests.
//!
//! Every epoch is a unit continuum with Gaussian absorption lines at fixed
//! rest wavelengths, Doppler shifted by a sinusoidal RV signal plus Gaussian
//! jitter, with white flux noise. The mask written alongside lists the same
//! rest wavelengths weighted by line depth, so `rvs rv` can recover the
//! injected signal.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Epoch, LineMask, MaskLine, SimulateConfig, SpectralTimeSeries, SpectralUnits};
use crate::error::{Result, RvError};
use crate::math::{SPEED_OF_LIGHT_KMS, linspace, shift_one};

/// Largest |v| (km/s) a line may be shifted by and still stay on the grid,
/// including the default CCF velocity grid.
const EDGE_VELOCITY: f64 = 50.0;

/// Smallest flux error written; keeps the RV error formula finite for
/// noiseless data.
const MIN_FLUX_ERR: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct SampleSpectra {
    pub spectra: SpectralTimeSeries,
    pub mask: LineMask,
    /// Injected RV of every epoch (km/s).
    pub true_rv: Vec<f64>,
}

pub fn generate_spectra(config: &SimulateConfig) -> Result<SampleSpectra> {
    validate(config)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| RvError::validation(format!("noise distribution error: {e}")))?;

    let margin = config.wave_max * EDGE_VELOCITY / SPEED_OF_LIGHT_KMS + 5.0 * config.line_sigma;
    let (line_lo, line_hi) = (config.wave_min + margin, config.wave_max - margin);
    if line_hi <= line_lo {
        return Err(RvError::validation(format!(
            "wavelength range [{}, {}] is too narrow for lines of σ={}",
            config.wave_min, config.wave_max, config.line_sigma
        )));
    }

    let mut lines: Vec<MaskLine> = (0..config.lines)
        .map(|_| MaskLine {
            wave: rng.gen_range(line_lo..line_hi),
            weight: config.line_depth * rng.gen_range(0.3..=1.0),
        })
        .collect();
    lines.sort_by(|a, b| a.wave.total_cmp(&b.wave));

    let n_pix = ((config.wave_max - config.wave_min) / config.pixel).floor() as usize + 1;
    let wave = linspace(config.wave_min, config.wave_min + (n_pix - 1) as f64 * config.pixel, n_pix);
    let two_var = 2.0 * config.line_sigma * config.line_sigma;

    let mut epochs = Vec::with_capacity(config.epochs);
    let mut true_rv = Vec::with_capacity(config.epochs);
    for i in 0..config.epochs {
        // Irregular sampling, still monotone in time.
        let time = (i as f64 + rng.gen_range(0.0..0.3)) * config.cadence;
        let rv = config.rv_amplitude * (std::f64::consts::TAU * time / config.rv_period).sin()
            + config.rv_jitter * normal.sample(&mut rng);

        let centres: Vec<(f64, f64)> = lines.iter().map(|l| (shift_one(l.wave, rv), l.weight)).collect();
        let flux_val = wave
            .iter()
            .map(|&w| {
                let absorption: f64 = centres
                    .iter()
                    .map(|&(c, depth)| depth * (-(w - c) * (w - c) / two_var).exp())
                    .sum();
                1.0 - absorption + config.noise * normal.sample(&mut rng)
            })
            .collect();

        epochs.push(Epoch {
            time,
            wave: wave.clone(),
            flux_val,
            flux_err: vec![config.noise.max(MIN_FLUX_ERR); n_pix],
        });
        true_rv.push(rv);
    }

    let units = SpectralUnits {
        time_unit: Some("d".to_string()),
        wave_unit: Some("Angstrom".to_string()),
        flux_unit: Some("normalized".to_string()),
    };
    Ok(SampleSpectra {
        spectra: SpectralTimeSeries::new(epochs, units)?,
        mask: LineMask {
            id: "synthetic".to_string(),
            lines,
        },
        true_rv,
    })
}

fn validate(config: &SimulateConfig) -> Result<()> {
    if config.epochs == 0 {
        return Err(RvError::validation("epoch count must be > 0"));
    }
    if config.lines == 0 {
        return Err(RvError::validation("line count must be > 0"));
    }
    let positive = [
        ("cadence", config.cadence),
        ("pixel", config.pixel),
        ("line sigma", config.line_sigma),
        ("line depth", config.line_depth),
        ("rv period", config.rv_period),
        ("wave min", config.wave_min),
    ];
    for (name, v) in positive {
        if !(v.is_finite() && v > 0.0) {
            return Err(RvError::validation(format!("{name} must be positive, got {v}")));
        }
    }
    let non_negative = [
        ("rv amplitude", config.rv_amplitude),
        ("rv jitter", config.rv_jitter),
        ("noise", config.noise),
    ];
    for (name, v) in non_negative {
        if !(v.is_finite() && v >= 0.0) {
            return Err(RvError::validation(format!("{name} must be >= 0, got {v}")));
        }
    }
    if config.line_depth > 1.0 {
        return Err(RvError::validation(format!(
            "line depth must be <= 1, got {}",
            config.line_depth
        )));
    }
    if !(config.wave_max.is_finite() && config.wave_max > config.wave_min) {
        return Err(RvError::validation(format!(
            "invalid wavelength range [{}, {}]",
            config.wave_min, config.wave_max
        )));
    }
    Ok(())
}
