//! Inverted-Gaussian line profile.
//!
//! `f(v; C, a, b, c) = C − a·exp(−(v − b)² / (2·(c / 2.3548)²))`
//!
//! `c` is the full width at half maximum, so the same parameter vector
//! describes the CCF template and the fitted CCF moments.

use crate::math::lm::LeastSquaresModel;

/// FWHM / σ ratio of a Gaussian, as used by the profile parameterization.
pub const FWHM_PER_SIGMA: f64 = 2.3548;

/// Evaluate the profile at velocity `v` with parameters `[C, a, b, c]`.
pub fn inverted_gaussian(v: f64, p: &[f64]) -> f64 {
    let sigma = p[3] / FWHM_PER_SIGMA;
    let d = v - p[2];
    p[0] - p[1] * (-(d * d) / (2.0 * sigma * sigma)).exp()
}

/// The profile as a least-squares model with analytic partial derivatives.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvertedGaussian;

impl LeastSquaresModel for InvertedGaussian {
    fn n_params(&self) -> usize {
        4
    }

    fn value(&self, x: f64, p: &[f64]) -> f64 {
        inverted_gaussian(x, p)
    }

    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
        let (a, b, c) = (p[1], p[2], p[3]);
        let sigma = c / FWHM_PER_SIGMA;
        let d = x - b;
        let e = (-(d * d) / (2.0 * sigma * sigma)).exp();
        out[0] = 1.0;
        out[1] = -e;
        out[2] = -a * e * d / (sigma * sigma);
        out[3] = -a * e * d * d / (sigma * sigma * sigma * FWHM_PER_SIGMA);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_has_depth_at_center_and_half_depth_at_fwhm() {
        let p = [1.0, 0.4, 2.0, 10.0];
        assert!((inverted_gaussian(2.0, &p) - 0.6).abs() < 1e-12);
        let half = inverted_gaussian(2.0 + 5.0, &p);
        // 2.3548 is a rounded 2·sqrt(2·ln 2), hence the loose tolerance.
        assert!((half - 0.8).abs() < 1e-4, "got {half}");
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let p = [1.0, 0.3, -1.5, 7.0];
        let model = InvertedGaussian;
        let mut g = [0.0; 4];
        for &v in &[-10.0, -2.0, 0.0, 3.5] {
            model.gradient(v, &p, &mut g);
            for j in 0..4 {
                let h = 1e-6 * p[j].abs().max(1.0);
                let mut hi = p;
                let mut lo = p;
                hi[j] += h;
                lo[j] -= h;
                let fd = (inverted_gaussian(v, &hi) - inverted_gaussian(v, &lo)) / (2.0 * h);
                assert!((fd - g[j]).abs() < 1e-6, "v={v} j={j}: {fd} vs {}", g[j]);
            }
        }
    }
}
