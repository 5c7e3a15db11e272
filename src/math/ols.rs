//! Dense linear solves used by the nonlinear fitter.
//!
//! Each Levenberg–Marquardt iteration solves a small damped normal-equation
//! system. The parameter dimension is tiny (a handful of coefficients), so we
//! try Cholesky first and fall back to SVD when the system is close to singular.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve the symmetric positive (semi-)definite system `a · x = b`.
pub fn solve_normal_equations(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    solve_least_squares(a, b)
}

/// Inverse of a symmetric positive (semi-)definite matrix, falling back to
/// the pseudo-inverse when it is singular.
pub fn invert_normal_matrix(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let inv = chol.inverse();
        if inv.iter().all(|v| v.is_finite()) {
            return Some(inv);
        }
    }
    a.clone().pseudo_inverse(1e-14).ok()
}
