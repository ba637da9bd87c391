//! L2-regularized logistic regression fitted by iteratively reweighted least
//! squares (IRLS).
//!
//! Objective (with per-row sample weights `s_i` and `S = Σ s_i`):
//!
//! ```text
//! minimize  Σ s_i · logloss(y_i, σ(x̃_i^T β)) + (S·λ / 2) · Σ_{j≥1} β_j^2
//! ```
//!
//! where `x̃_i = [1, x_i]` and the intercept `β_0` is not penalized. Scaling the
//! penalty by `S` keeps λ comparable across training-set sizes (it is the
//! penalty per unit of sample weight).
//!
//! Each Newton step solves the weighted ridge system
//! `(X̃ᵀWX̃ + SλI') β = X̃ᵀWz` with working weights `w_i = s_i μ_i (1 - μ_i)` and
//! working response `z_i = η_i + (y_i - μ_i) / (μ_i (1 - μ_i))`.

use nalgebra::{DMatrix, DVector};

use crate::domain::ClassWeight;
use crate::error::AppError;
use crate::math::{logit, sigmoid, solve_weighted_ridge};

/// Floor on `μ(1 - μ)` to keep working weights and responses finite.
const MIN_VARIANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy)]
pub struct IrlsOptions {
    pub lambda: f64,
    pub max_iter: usize,
    pub tol: f64,
}

/// Result of one IRLS run. `beta[0]` is the intercept.
#[derive(Debug, Clone)]
pub struct IrlsFit {
    pub beta: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl IrlsFit {
    /// Probabilities for the rows of `x` (no intercept column).
    pub fn predict(&self, x: &DMatrix<f64>) -> Vec<f64> {
        predict_rows(&self.beta, x)
    }
}

pub fn predict_rows(beta: &[f64], x: &DMatrix<f64>) -> Vec<f64> {
    (0..x.nrows())
        .map(|i| {
            let eta = beta[0]
                + x.row(i)
                    .iter()
                    .zip(&beta[1..])
                    .map(|(xi, b)| xi * b)
                    .sum::<f64>();
            sigmoid(eta)
        })
        .collect()
}

/// Per-row sample weights for the chosen class weighting.
///
/// `Balanced` gives each class the same total weight (`n / 2`).
pub fn sample_weights(y: &[f64], mode: ClassWeight) -> Vec<f64> {
    match mode {
        ClassWeight::None => vec![1.0; y.len()],
        ClassWeight::Balanced => {
            let n = y.len() as f64;
            let n_pos = y.iter().filter(|&&v| v == 1.0).count() as f64;
            let n_neg = n - n_pos;
            y.iter()
                .map(|&v| {
                    let n_class = if v == 1.0 { n_pos } else { n_neg };
                    if n_class > 0.0 { n / (2.0 * n_class) } else { 0.0 }
                })
                .collect()
        }
    }
}

/// Fit the model on design matrix `x` (n × p, no intercept column).
pub fn fit_logistic(
    x: &DMatrix<f64>,
    y: &[f64],
    weights: &[f64],
    opts: &IrlsOptions,
) -> Result<IrlsFit, AppError> {
    let (n, p) = x.shape();
    if n == 0 {
        return Err(AppError::new(3, "No rows to fit."));
    }
    if y.len() != n || weights.len() != n {
        return Err(AppError::new(4, "Design matrix / label length mismatch."));
    }
    if !(opts.lambda.is_finite() && opts.lambda >= 0.0) {
        return Err(AppError::new(2, format!("Invalid lambda {}.", opts.lambda)));
    }

    let design = with_intercept(x);
    let total_weight: f64 = weights.iter().sum();
    if !(total_weight.is_finite() && total_weight > 0.0) {
        return Err(AppError::new(4, "Sample weights sum to zero."));
    }

    let mut penalty = vec![total_weight * opts.lambda; p + 1];
    penalty[0] = 0.0;

    // Start from the weighted base rate with all slopes at zero.
    let base_rate = y.iter().zip(weights).map(|(yi, wi)| yi * wi).sum::<f64>() / total_weight;
    let mut beta = DVector::<f64>::zeros(p + 1);
    beta[0] = logit(base_rate);

    let mut w = DVector::<f64>::zeros(n);
    let mut z = DVector::<f64>::zeros(n);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < opts.max_iter {
        iterations += 1;

        let eta = &design * &beta;
        for i in 0..n {
            let mu = sigmoid(eta[i]);
            let var = (mu * (1.0 - mu)).max(MIN_VARIANCE);
            w[i] = weights[i] * var;
            z[i] = eta[i] + (y[i] - mu) / var;
        }

        let next = solve_weighted_ridge(&design, &w, &z, &penalty).ok_or_else(|| {
            AppError::new(
                4,
                format!("IRLS step {iterations} failed: singular system (lambda={}).", opts.lambda),
            )
        })?;

        let delta = (&next - &beta).amax();
        beta = next;
        if delta < opts.tol {
            converged = true;
            break;
        }
    }

    Ok(IrlsFit {
        beta: beta.iter().copied().collect(),
        iterations,
        converged,
    })
}

fn with_intercept(x: &DMatrix<f64>) -> DMatrix<f64> {
    x.clone().insert_column(0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::log_loss_term;

    /// One standardized feature with a clear positive effect.
    fn toy() -> (DMatrix<f64>, Vec<f64>) {
        let xs = [-2.0, -1.5, -1.0, -0.5, -0.2, 0.2, 0.5, 1.0, 1.5, 2.0];
        let ys = [0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
        (DMatrix::from_column_slice(10, 1, &xs), ys.to_vec())
    }

    fn opts(lambda: f64) -> IrlsOptions {
        IrlsOptions {
            lambda,
            max_iter: 100,
            tol: 1e-10,
        }
    }

    #[test]
    fn irls_converges_and_finds_positive_slope() {
        let (x, y) = toy();
        let fit = fit_logistic(&x, &y, &vec![1.0; 10], &opts(0.0)).unwrap();
        assert!(fit.converged);
        assert!(fit.beta[1] > 0.5);

        // Gradient of the unpenalized log-likelihood vanishes at the optimum.
        let p = fit.predict(&x);
        let grad0: f64 = y.iter().zip(&p).map(|(yi, pi)| yi - pi).sum();
        assert!(grad0.abs() < 1e-6);
    }

    #[test]
    fn stronger_penalty_shrinks_coefficients() {
        let (x, y) = toy();
        let w = vec![1.0; 10];
        let weak = fit_logistic(&x, &y, &w, &opts(1e-4)).unwrap();
        let strong = fit_logistic(&x, &y, &w, &opts(10.0)).unwrap();
        assert!(strong.beta[1].abs() < weak.beta[1].abs());
        assert!(strong.beta[1].abs() < 0.2);
    }

    #[test]
    fn fit_improves_on_base_rate() {
        let (x, y) = toy();
        let fit = fit_logistic(&x, &y, &vec![1.0; 10], &opts(0.01)).unwrap();
        let p = fit.predict(&x);
        let model_loss: f64 = y.iter().zip(&p).map(|(&yi, &pi)| log_loss_term(yi, pi)).sum();
        let base_loss: f64 = y.iter().map(|&yi| log_loss_term(yi, 0.5)).sum();
        assert!(model_loss < base_loss);
    }

    #[test]
    fn balanced_weights_equalize_classes() {
        let y = [1.0, 0.0, 0.0, 0.0];
        let w = sample_weights(&y, ClassWeight::Balanced);
        assert!((w[0] - 2.0).abs() < 1e-12);
        assert!((w[1..].iter().sum::<f64>() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn max_iter_limits_work_without_error() {
        let (x, y) = toy();
        let mut o = opts(0.0);
        o.max_iter = 1;
        let fit = fit_logistic(&x, &y, &vec![1.0; 10], &o).unwrap();
        assert_eq!(fit.iterations, 1);
        assert!(!fit.converged);
    }
}
