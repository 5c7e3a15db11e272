//! Joint nonlinear fit of VPSD components.
//!
//! Given:
//! - a VPSD (frequency, density)
//! - an ordered list of components with initial coefficients
//!
//! we fit the composite (sum of all components) to the density with
//! Levenberg–Marquardt and report per-component coefficients, standard
//! errors from the fit covariance, and residual diagnostics.

use tracing::{debug, info};

use crate::domain::{FitQuality, FitResult, FitTarget, Vpsd, VpsdComponent};
use crate::error::{Result, RvError};
use crate::math::{LmOptions, levenberg_marquardt};
use crate::models::Composite;

/// Fitting options.
#[derive(Debug, Clone, Default)]
pub struct ComponentFitOptions {
    pub target: FitTarget,
    pub lm: LmOptions,
}

/// Fit `components` to the VPSD.
///
/// The returned components keep their input order and names; their `coef`
/// holds the best fit and `coef_err` the standard errors.
pub fn fit_components(
    vpsd: &Vpsd,
    components: &[VpsdComponent],
    opts: &ComponentFitOptions,
) -> Result<FitResult> {
    let (composite, p0) = Composite::from_components(components)?;

    let (freq, density) = match opts.target {
        FitTarget::Full => (&vpsd.frequency, &vpsd.density),
        FitTarget::Binned => (&vpsd.freq_avg, &vpsd.density_avg),
    };
    if freq.len() != density.len() {
        return Err(RvError::validation(format!(
            "VPSD arrays differ in length (frequency={}, density={})",
            freq.len(),
            density.len()
        )));
    }
    let n = freq.len();
    let k = p0.len();
    if n < k {
        return Err(RvError::validation(format!(
            "{n} VPSD points cannot constrain {k} coefficients"
        )));
    }

    debug!(components = components.len(), coefficients = k, points = n, "fitting VPSD components");
    let fit = levenberg_marquardt(&composite, freq, density, None, &p0, &opts.lm)?;
    if fit.params.iter().any(|v| !v.is_finite()) {
        return Err(RvError::fit(format!(
            "component fit returned non-finite coefficients {:?}",
            fit.params
        )));
    }

    let fitted: Vec<VpsdComponent> = components
        .iter()
        .enumerate()
        .map(|(i, c)| VpsdComponent {
            name: c.name.clone(),
            kind: c.kind,
            coef: composite.coef(i, &fit.params).to_vec(),
            coef_err: Some(composite.coef(i, &fit.std_err).to_vec()),
        })
        .collect();

    let quality = fit_quality(fit.cost, n, k, fit.iterations);
    info!(
        sse = quality.sse,
        rmse = quality.rmse,
        bic = quality.bic,
        iterations = quality.iterations,
        "VPSD component fit converged"
    );

    Ok(FitResult {
        components: fitted,
        target: opts.target,
        quality,
    })
}

/// SSE/RMSE and BIC = n·ln(SSE/n) + k·ln(n).
///
/// SSE/n is floored at `f64::MIN_POSITIVE`, so an exact fit has a finite BIC.
fn fit_quality(sse: f64, n: usize, k: usize, iterations: usize) -> FitQuality {
    let nf = n as f64;
    let rmse = (sse / nf).sqrt();
    let bic = nf * (sse / nf).max(f64::MIN_POSITIVE).ln() + k as f64 * nf.ln();
    FitQuality {
        n,
        dof: n.saturating_sub(k),
        sse,
        rmse,
        bic,
        iterations,
    }
}
