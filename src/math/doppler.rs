//! Non-relativistic Doppler shift of wavelengths.

use crate::error::{Result, RvError};

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Shift a single wavelength by velocity `v` (km/s).
#[inline]
pub fn shift_one(wave: f64, v: f64) -> f64 {
    wave * (1.0 + v / SPEED_OF_LIGHT_KMS)
}

/// Shift every wavelength by velocity `v` (km/s): `λ·(1 + v/c)`.
pub fn shift(wave: &[f64], v: f64) -> Result<Vec<f64>> {
    if wave.is_empty() {
        return Err(RvError::domain("cannot Doppler-shift an empty wavelength array"));
    }
    Ok(wave.iter().map(|&w| shift_one(w, v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_is_invertible_to_first_order() {
        let wave = [3800.0, 5000.0, 6562.8, 9000.0];
        for &v in &[-300.0, -20.0, 0.0, 0.25, 150.0] {
            let back = shift(&shift(&wave, v).unwrap(), -v).unwrap();
            for (a, b) in wave.iter().zip(&back) {
                // (1 + v/c)(1 - v/c) = 1 - (v/c)^2
                let tol = a * (v / SPEED_OF_LIGHT_KMS).powi(2) + 1e-9;
                assert!((a - b).abs() <= tol, "v={v}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn shift_rejects_empty_input() {
        assert!(matches!(shift(&[], 1.0), Err(RvError::Domain(_))));
    }

    #[test]
    fn positive_velocity_redshifts() {
        let out = shift(&[5000.0], 10.0).unwrap();
        assert!(out[0] > 5000.0);
        assert!((out[0] - 5000.0 * (1.0 + 10.0 / SPEED_OF_LIGHT_KMS)).abs() < 1e-12);
    }
}
