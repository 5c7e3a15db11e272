//! Cross-correlation of one spectrum with a weighted line mask.
//!
//! For every trial velocity the mask centres are Doppler-shifted and the
//! spectrum is linearly interpolated at each shifted centre:
//!
//! ```text
//! CCF(v)   = Σ_k w_k · (F[l]·f_l + F[r]·f_r)
//! σ_CCF(v) = sqrt( Σ_k w_k² · (σ[l]²·f_l + σ[r]²·f_r) )
//! ```
//!
//! where `r` is the right-insertion index of the shifted centre, `l = r − 1`,
//! `f_r = (λ_k − λ[l]) / (λ[r] − λ[l])` and `f_l = 1 − f_r`. Pixel errors are
//! assumed independent.

use crate::domain::{CcfRecord, Epoch, LineMask, VelocityGrid};
use crate::error::{Result, RvError};
use crate::math::{search_right, shift_one};

/// Build the CCF of `epoch` against an already filtered, normalized mask.
pub fn build_ccf(epoch: &Epoch, mask: &LineMask, grid: &VelocityGrid) -> Result<CcfRecord> {
    let wave = &epoch.wave;
    let n = wave.len();
    let velocity = grid.values().to_vec();
    let mut value = Vec::with_capacity(velocity.len());
    let mut error = Vec::with_capacity(velocity.len());

    for &v in &velocity {
        let mut ccf = 0.0;
        let mut var = 0.0;
        for line in &mask.lines {
            let wc = shift_one(line.wave, v);
            let i_r = search_right(wave, wc);
            if i_r == 0 || i_r >= n {
                return Err(RvError::domain(format!(
                    "mask line {} shifted by {v} km/s to {wc} falls outside the spectrum [{}, {}] ({n} pixels)",
                    line.wave,
                    wave[0],
                    wave[n - 1]
                )));
            }
            let i_l = i_r - 1;
            let f_r = (wc - wave[i_l]) / (wave[i_r] - wave[i_l]);
            let f_l = 1.0 - f_r;

            ccf += line.weight * (epoch.flux_val[i_l] * f_l + epoch.flux_val[i_r] * f_r);
            var += line.weight
                * line.weight
                * (epoch.flux_err[i_l].powi(2) * f_l + epoch.flux_err[i_r].powi(2) * f_r);
        }
        value.push(ccf);
        error.push(var.sqrt());
    }

    Ok(CcfRecord {
        velocity,
        value,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MaskLine;

    fn flat_epoch() -> Epoch {
        let n = 401;
        Epoch {
            time: 0.0,
            wave: (0..n).map(|i| 4999.0 + i as f64 * 0.01).collect(),
            flux_val: vec![1.0; n],
            flux_err: vec![0.02; n],
        }
    }

    fn mask(lines: &[f64]) -> LineMask {
        let w = 1.0 / lines.len() as f64;
        LineMask {
            id: "test".into(),
            lines: lines.iter().map(|&wave| MaskLine { wave, weight: w }).collect(),
        }
    }

    #[test]
    fn flat_spectrum_gives_flat_ccf_and_propagated_error() {
        let epoch = flat_epoch();
        let grid = VelocityGrid::default();
        let ccf = build_ccf(&epoch, &mask(&[5000.0, 5001.0, 5002.0]), &grid).unwrap();
        assert_eq!(ccf.value.len(), grid.len());
        // σ = sqrt(3 · (1/3)² · 0.02²) = 0.02 / sqrt(3)
        let expected_err = 0.02 / 3f64.sqrt();
        for (v, e) in ccf.value.iter().zip(&ccf.error) {
            assert!((v - 1.0).abs() < 1e-12);
            assert!((e - expected_err).abs() < 1e-12);
        }
    }

    #[test]
    fn interpolation_is_linear_between_pixels() {
        let mut epoch = flat_epoch();
        // Linear ramp in flux: CCF at a single line equals the ramp value there.
        epoch.flux_val = epoch.wave.iter().map(|w| (w - 4999.0) * 0.1).collect();
        let grid = VelocityGrid::new(-1.0, 1.0, 0.5).unwrap();
        let ccf = build_ccf(&epoch, &mask(&[5001.005]), &grid).unwrap();
        for (v, c) in grid.values().iter().zip(&ccf.value) {
            let expected = (shift_one(5001.005, *v) - 4999.0) * 0.1;
            assert!((c - expected).abs() < 1e-9, "v={v}: {c} vs {expected}");
        }
    }

    #[test]
    fn line_outside_spectrum_is_domain_error() {
        let epoch = flat_epoch();
        let err = build_ccf(&epoch, &mask(&[6000.0]), &VelocityGrid::default()).unwrap_err();
        assert!(matches!(err, RvError::Domain(_)));
    }
}
