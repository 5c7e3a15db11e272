//! RV and FWHM extraction from a CCF.
//!
//! The inverted-Gaussian profile is fitted to the CCF by weighted
//! Levenberg–Marquardt from a deterministic initial guess:
//!
//! - `C0 = max(ccf)`, `a0 = C0 − min(ccf)`
//! - `b0` = velocity at the (first) minimum
//! - `c0 = 2·(b0 − v_k)` where `k` is the first index, scanning from the
//!   left, whose CCF value is below the half depth `C0 − a0/2`
//!
//! The RV error is not taken from the fit covariance. It is propagated
//! through the discrete derivative of velocity with respect to the CCF:
//!
//! ```text
//! σ_RV = 1 / sqrt( Σ_j ( dCCF_j / (σ_CCF,j · dv_j) )² )
//! ```
//!
//! with `d·` the unit-spacing discrete gradient. Points where the CCF is flat
//! contribute nothing.

use crate::domain::{CcfMoments, CcfRecord, MIN_VELOCITY_POINTS};
use crate::error::{Result, RvError};
use crate::math::{InvertedGaussian, LmOptions, argmax, argmin, gradient, levenberg_marquardt};

/// Initial guess `[C0, a0, b0, c0]` for the profile fit.
pub fn initial_guess(velocity: &[f64], ccf: &[f64]) -> Result<[f64; 4]> {
    if velocity.len() != ccf.len() {
        return Err(RvError::validation(format!(
            "CCF arrays differ in length (velocity={}, ccf={})",
            velocity.len(),
            ccf.len()
        )));
    }
    if ccf.len() < MIN_VELOCITY_POINTS {
        return Err(RvError::domain(format!(
            "CCF has {} points, need at least {MIN_VELOCITY_POINTS}",
            ccf.len()
        )));
    }
    if ccf.iter().any(|v| !v.is_finite()) {
        return Err(RvError::fit("CCF contains non-finite values"));
    }

    let (Some(i_max), Some(i_min)) = (argmax(ccf), argmin(ccf)) else {
        return Err(RvError::fit("empty CCF"));
    };
    let c0 = ccf[i_max];
    let a0 = c0 - ccf[i_min];
    let b0 = velocity[i_min];

    let half = c0 - a0 / 2.0;
    let i_half = ccf
        .iter()
        .position(|&v| v < half)
        .ok_or_else(|| RvError::fit("CCF has no half-depth crossing (flat CCF)"))?;
    let width = 2.0 * (b0 - velocity[i_half]);
    if width <= 0.0 {
        return Err(RvError::fit(format!(
            "CCF has no half-depth crossing left of the minimum at {b0} km/s"
        )));
    }

    Ok([c0, a0, b0, width])
}

/// Propagated RV uncertainty of a CCF.
pub fn rv_error(ccf: &CcfRecord) -> f64 {
    let dv = gradient(&ccf.velocity);
    let dccf = gradient(&ccf.value);
    let sum: f64 = dccf
        .iter()
        .zip(&dv)
        .zip(&ccf.error)
        .map(|((&dc, &dv), &err)| {
            let t = dc / (err * dv);
            t * t
        })
        .sum();
    1.0 / sum.sqrt()
}

/// Fit the line profile to a CCF and return its moments.
pub fn extract_moments(ccf: &CcfRecord, opts: &LmOptions) -> Result<CcfMoments> {
    let p0 = initial_guess(&ccf.velocity, &ccf.value)?;
    let fit = levenberg_marquardt(
        &InvertedGaussian,
        &ccf.velocity,
        &ccf.value,
        Some(&ccf.error),
        &p0,
        opts,
    )?;
    let p = &fit.params;
    if p.iter().any(|v| !v.is_finite()) {
        return Err(RvError::fit(format!("profile fit returned non-finite parameters {p:?}")));
    }

    Ok(CcfMoments {
        continuum: p[0],
        depth: p[1],
        rv: p[2],
        fwhm: p[3],
        rv_err: rv_error(ccf),
    })
}
