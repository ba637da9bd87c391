//! Linear solvers used by the logistic-regression fitter.
//!
//! Each IRLS step reduces to a ridge-penalized weighted least-squares problem:
//!
//! ```text
//! minimize Σ w_i (z_i - x_i^T β)^2 + Σ_j λ_j β_j^2
//! ```
//!
//! whose normal equations `(XᵀWX + Λ) β = XᵀWz` are symmetric positive
//! definite whenever `λ_j > 0` for every penalized column. We solve them with a
//! Cholesky factorization and fall back to SVD when the system is too
//! ill-conditioned for Cholesky (e.g. an all-zero one-hot column with a tiny λ).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve the penalized weighted least squares problem.
///
/// - `x`: design matrix (n × p), including the intercept column if any
/// - `w`: non-negative row weights (length n)
/// - `z`: working response (length n)
/// - `penalty`: ridge strength per column (length p, `0` = unpenalized)
pub fn solve_weighted_ridge(
    x: &DMatrix<f64>,
    w: &DVector<f64>,
    z: &DVector<f64>,
    penalty: &[f64],
) -> Option<DVector<f64>> {
    let (n, p) = x.shape();
    if w.len() != n || z.len() != n || penalty.len() != p {
        return None;
    }

    // Scale rows by sqrt(w) so XᵀWX = X_wᵀ X_w.
    let mut xw = x.clone();
    let mut zw = z.clone();
    for i in 0..n {
        let sw = w[i].max(0.0).sqrt();
        xw.row_mut(i).scale_mut(sw);
        zw[i] *= sw;
    }

    let mut a = xw.tr_mul(&xw);
    for (j, &lam) in penalty.iter().enumerate() {
        a[(j, j)] += lam.max(0.0);
    }
    let b = xw.tr_mul(&zw);

    if let Some(chol) = a.clone().cholesky() {
        let beta = chol.solve(&b);
        if beta.iter().all(|v| v.is_finite()) {
            return Some(beta);
        }
    }

    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn weighted_ridge_without_penalty_matches_ols() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let z = DVector::from_row_slice(&[1.0, 3.0, 5.0, 7.0]);
        let w = DVector::from_element(4, 1.0);

        let beta = solve_weighted_ridge(&x, &w, &z, &[0.0, 0.0]).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn penalty_shrinks_slope_only() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, -1.5, 1.0, -0.5, 1.0, 0.5, 1.0, 1.5]);
        let z = DVector::from_row_slice(&[-2.0, -0.5, 1.5, 3.0]);
        let w = DVector::from_element(4, 1.0);

        let free = solve_weighted_ridge(&x, &w, &z, &[0.0, 0.0]).unwrap();
        let shrunk = solve_weighted_ridge(&x, &w, &z, &[0.0, 100.0]).unwrap();
        assert!(shrunk[1].abs() < free[1].abs());
        // Centered column: the intercept is the mean of z either way.
        assert!((shrunk[0] - free[0]).abs() < 1e-9);
    }
}
