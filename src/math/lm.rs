//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ ((y_i − f(x_i; p)) / σ_i)²` for a model with analytic partial
//! derivatives. Each iteration solves the Marquardt-damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! accepting the step when the cost decreases (λ shrinks) and retrying with a
//! larger λ otherwise.
//!
//! Parameter uncertainties follow the relative-sigma convention: the
//! covariance `(JᵀJ)⁻¹` is scaled by the reduced chi-square `cost / (n − p)`.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, RvError};
use crate::math::ols::{invert_normal_matrix, solve_normal_equations};

/// A model `f(x; p)` that can be fitted by [`levenberg_marquardt`].
pub trait LeastSquaresModel {
    fn n_params(&self) -> usize;

    fn value(&self, x: f64, p: &[f64]) -> f64;

    /// Write `∂f/∂p_j` at `x` into `out` (length `n_params()`).
    fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]);
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iter: usize,
    /// Relative cost reduction below which an accepted step counts as converged.
    pub ftol: f64,
    /// Relative step size below which an accepted step counts as converged.
    pub xtol: f64,
    /// Absolute gradient (`‖Jᵀr‖∞`) below which the current point is accepted.
    pub gtol: f64,
    pub lambda_init: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 500,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-15,
            lambda_init: 1e-3,
        }
    }
}

/// Converged fit.
#[derive(Debug, Clone)]
pub struct LmFit {
    pub params: Vec<f64>,
    /// Standard errors (NaN when there are no residual degrees of freedom).
    pub std_err: Vec<f64>,
    /// Weighted sum of squared residuals at the solution.
    pub cost: f64,
    pub iterations: usize,
    pub n: usize,
}

const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_MIN: f64 = 1e-15;
const DIAG_FLOOR: f64 = 1e-300;

/// Fit `model` to `(x, y)` starting from `p0`.
///
/// `sigma`, when given, holds per-point uncertainties (weights `1/σ²`).
pub fn levenberg_marquardt<M: LeastSquaresModel + ?Sized>(
    model: &M,
    x: &[f64],
    y: &[f64],
    sigma: Option<&[f64]>,
    p0: &[f64],
    opts: &LmOptions,
) -> Result<LmFit> {
    let n = x.len();
    let m = model.n_params();
    if y.len() != n || sigma.is_some_and(|s| s.len() != n) {
        return Err(RvError::validation(format!(
            "fit arrays differ in length (x={n}, y={}, sigma={})",
            y.len(),
            sigma.map_or(n, |s| s.len())
        )));
    }
    if p0.len() != m {
        return Err(RvError::validation(format!(
            "initial guess has {} parameters, model needs {m}",
            p0.len()
        )));
    }
    if n == 0 {
        return Err(RvError::validation("no data points to fit"));
    }
    if p0.iter().any(|v| !v.is_finite()) {
        return Err(RvError::fit(format!("non-finite initial guess {p0:?}")));
    }
    let inv_sigma: Vec<f64> = match sigma {
        Some(s) => {
            if s.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                return Err(RvError::validation("fit uncertainties must be positive and finite"));
            }
            s.iter().map(|v| 1.0 / v).collect()
        }
        None => vec![1.0; n],
    };

    let mut p = p0.to_vec();
    let mut system = NormalSystem::build(model, x, y, &inv_sigma, &p)
        .ok_or_else(|| RvError::fit(format!("model is not finite at initial guess {p0:?}")))?;
    let mut lambda = opts.lambda_init;

    for iter in 1..=opts.max_iter {
        if system.cost == 0.0 || system.grad_inf() <= opts.gtol {
            return Ok(finish(system, p, iter - 1, n, m));
        }

        let step = loop {
            let mut damped = system.jtj.clone();
            for j in 0..m {
                damped[(j, j)] += lambda * system.jtj[(j, j)].max(DIAG_FLOOR);
            }
            let candidate = solve_normal_equations(&damped, &system.jtr)
                .map(|delta| {
                    let p_new: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
                    (delta, p_new)
                })
                .and_then(|(delta, p_new)| {
                    NormalSystem::build(model, x, y, &inv_sigma, &p_new)
                        .filter(|s| s.cost < system.cost)
                        .map(|s| (delta, p_new, s))
                });
            match candidate {
                Some(accepted) => break Some(accepted),
                None => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        break None;
                    }
                }
            }
        };

        let Some((delta, p_new, next)) = step else {
            // No downhill step exists at machine precision: stationary point.
            return Ok(finish(system, p, iter, n, m));
        };

        let reduction = (system.cost - next.cost) / system.cost;
        let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
        let step_norm = delta.norm();

        p = p_new;
        system = next;
        lambda = (lambda / 10.0).max(LAMBDA_MIN);

        if reduction <= opts.ftol || step_norm <= opts.xtol * (p_norm + opts.xtol) {
            return Ok(finish(system, p, iter, n, m));
        }
    }

    Err(RvError::fit(format!(
        "no convergence after {} iterations (last parameters {p:?})",
        opts.max_iter
    )))
}

fn finish(system: NormalSystem, params: Vec<f64>, iterations: usize, n: usize, m: usize) -> LmFit {
    let scale = if n > m {
        system.cost / (n - m) as f64
    } else {
        f64::NAN
    };
    let std_err = match invert_normal_matrix(&system.jtj) {
        Some(cov) => (0..m).map(|j| (cov[(j, j)] * scale).abs().sqrt()).collect(),
        None => vec![f64::NAN; m],
    };
    LmFit {
        params,
        std_err,
        cost: system.cost,
        iterations,
        n,
    }
}

/// `JᵀJ`, `Jᵀr` and the cost at one parameter vector.
struct NormalSystem {
    jtj: DMatrix<f64>,
    jtr: DVector<f64>,
    cost: f64,
}

impl NormalSystem {
    fn build<M: LeastSquaresModel + ?Sized>(
        model: &M,
        x: &[f64],
        y: &[f64],
        inv_sigma: &[f64],
        p: &[f64],
    ) -> Option<Self> {
        let m = p.len();
        let mut jtj = DMatrix::<f64>::zeros(m, m);
        let mut jtr = DVector::<f64>::zeros(m);
        let mut cost = 0.0;
        let mut g = vec![0.0; m];

        for i in 0..x.len() {
            let w = inv_sigma[i];
            let r = (y[i] - model.value(x[i], p)) * w;
            model.gradient(x[i], p, &mut g);
            for gj in g.iter_mut() {
                *gj *= w;
            }
            for a in 0..m {
                jtr[a] += g[a] * r;
                for b in 0..=a {
                    jtj[(a, b)] += g[a] * g[b];
                }
            }
            cost += r * r;
        }
        for a in 0..m {
            for b in 0..a {
                jtj[(b, a)] = jtj[(a, b)];
            }
        }

        let finite = cost.is_finite() && jtj.iter().chain(jtr.iter()).all(|v| v.is_finite());
        finite.then_some(Self { jtj, jtr, cost })
    }

    fn grad_inf(&self) -> f64 {
        self.jtr.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = a·exp(−b·x)
    struct Decay;

    impl LeastSquaresModel for Decay {
        fn n_params(&self) -> usize {
            2
        }
        fn value(&self, x: f64, p: &[f64]) -> f64 {
            p[0] * (-p[1] * x).exp()
        }
        fn gradient(&self, x: f64, p: &[f64], out: &mut [f64]) {
            let e = (-p[1] * x).exp();
            out[0] = e;
            out[1] = -p[0] * x * e;
        }
    }

    #[test]
    fn recovers_exponential_decay() {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.2).collect();
        let y: Vec<f64> = x.iter().map(|&v| 3.0 * (-0.7 * v).exp()).collect();
        let fit = levenberg_marquardt(&Decay, &x, &y, None, &[1.0, 0.2], &LmOptions::default()).unwrap();
        assert!((fit.params[0] - 3.0).abs() < 1e-6, "{:?}", fit.params);
        assert!((fit.params[1] - 0.7).abs() < 1e-6, "{:?}", fit.params);
        assert!(fit.cost < 1e-12);
        assert!(fit.std_err.iter().all(|e| e.is_finite()));
    }

    #[test]
    fn noisy_fit_has_positive_standard_errors() {
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &v)| 2.0 * (-0.5 * v).exp() + if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let sigma = vec![0.01; x.len()];
        let fit =
            levenberg_marquardt(&Decay, &x, &y, Some(&sigma), &[1.5, 0.4], &LmOptions::default()).unwrap();
        assert!((fit.params[0] - 2.0).abs() < 0.02);
        assert!(fit.std_err.iter().all(|e| e.is_finite() && *e > 0.0));
    }

    #[test]
    fn rejects_wrong_initial_guess_length() {
        let err = levenberg_marquardt(&Decay, &[0.0, 1.0], &[1.0, 0.5], None, &[1.0], &LmOptions::default())
            .unwrap_err();
        assert!(matches!(err, RvError::Validation(_)));
    }

    #[test]
    fn iteration_cap_is_a_convergence_error() {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.2).collect();
        let y: Vec<f64> = x.iter().map(|&v| 3.0 * (-0.7 * v).exp()).collect();
        let opts = LmOptions {
            max_iter: 1,
            ..LmOptions::default()
        };
        let err = levenberg_marquardt(&Decay, &x, &y, None, &[1.0, 0.2], &opts).unwrap_err();
        assert!(matches!(err, RvError::FitConvergence(_)));
    }
}
