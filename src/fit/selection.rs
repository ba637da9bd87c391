//! Regularization selection by stratified k-fold cross-validation.
//!
//! For each λ on the grid we fit on `k - 1` folds and score mean log-loss on
//! the held-out fold. Candidates are independent and evaluated in parallel.
//!
//! Selection rule (one standard error):
//! 1. Find the λ with the lowest mean CV log-loss
//! 2. Among all λ whose mean loss is within one standard error of that best,
//!    pick the largest (most regularized)

use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::CvResult;
use crate::error::AppError;
use crate::eval::{log_loss, roc_auc};
use crate::fit::trainer::{IrlsOptions, fit_logistic};

/// Output of the λ search.
#[derive(Debug, Clone)]
pub struct LambdaSelection {
    pub lambda: f64,
    /// Index into `results` of the chosen λ.
    pub chosen: usize,
    /// Index into `results` of the minimum-loss λ.
    pub best: usize,
    /// One entry per λ that could be fitted on every fold, in grid order.
    pub results: Vec<CvResult>,
}

/// Training rows plus their fold assignment.
#[derive(Debug, Clone, Copy)]
pub struct CvData<'a> {
    pub x: &'a DMatrix<f64>,
    pub y: &'a [f64],
    pub weights: &'a [f64],
    /// `folds[i]` is the fold id of row `i` in `0..k`.
    pub folds: &'a [usize],
    pub k: usize,
}

/// Cross-validate every λ in `grid` (ascending) and apply the one-SE rule.
pub fn select_lambda(
    data: &CvData<'_>,
    grid: &[f64],
    max_iter: usize,
    tol: f64,
) -> Result<LambdaSelection, AppError> {
    if grid.is_empty() {
        return Err(AppError::new(4, "Lambda grid is empty."));
    }
    let n = data.y.len();
    if data.folds.len() != n || data.weights.len() != n || data.x.nrows() != n {
        return Err(AppError::new(4, "Fold assignment length mismatch."));
    }

    // Materialize fold matrices once; every λ reuses them.
    let splits: Vec<FoldData> = (0..data.k).map(|f| FoldData::new(data, f)).collect();

    let mut scored: Vec<(usize, CvResult)> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &lambda)| {
            let opts = IrlsOptions {
                lambda,
                max_iter,
                tol,
            };
            match cross_validate(&splits, &opts) {
                Ok(result) => Some((idx, result)),
                Err(e) => {
                    warn!(lambda, error = %e, "skipping lambda candidate");
                    None
                }
            }
        })
        .collect();
    scored.sort_by_key(|(idx, _)| *idx);
    let results: Vec<CvResult> = scored.into_iter().map(|(_, r)| r).collect();

    if results.is_empty() {
        return Err(AppError::new(
            4,
            "Cross-validation failed for every lambda candidate.",
        ));
    }

    let (best, chosen) = one_standard_error(&results);
    debug!(
        best_lambda = results[best].lambda,
        chosen_lambda = results[chosen].lambda,
        "lambda selection"
    );
    Ok(LambdaSelection {
        lambda: results[chosen].lambda,
        chosen,
        best,
        results,
    })
}

/// Returns `(best, chosen)` indices. Ties on the best loss keep the earlier λ.
pub fn one_standard_error(results: &[CvResult]) -> (usize, usize) {
    let mut best = 0;
    for (i, r) in results.iter().enumerate().skip(1) {
        if r.mean_log_loss < results[best].mean_log_loss {
            best = i;
        }
    }

    let limit = results[best].mean_log_loss + results[best].std_error;
    let mut chosen = best;
    for (i, r) in results.iter().enumerate() {
        if r.mean_log_loss <= limit && r.lambda > results[chosen].lambda {
            chosen = i;
        }
    }
    (best, chosen)
}

struct FoldData {
    x_train: DMatrix<f64>,
    y_train: Vec<f64>,
    w_train: Vec<f64>,
    x_valid: DMatrix<f64>,
    y_valid: Vec<f64>,
}

impl FoldData {
    fn new(data: &CvData<'_>, fold: usize) -> Self {
        let CvData { x, y, weights: w, folds, .. } = *data;
        let (train, valid): (Vec<usize>, Vec<usize>) =
            (0..y.len()).partition(|&i| folds[i] != fold);
        Self {
            x_train: x.select_rows(train.iter()),
            y_train: train.iter().map(|&i| y[i]).collect(),
            w_train: train.iter().map(|&i| w[i]).collect(),
            x_valid: x.select_rows(valid.iter()),
            y_valid: valid.iter().map(|&i| y[i]).collect(),
        }
    }
}

fn cross_validate(splits: &[FoldData], opts: &IrlsOptions) -> Result<CvResult, AppError> {
    let mut losses = Vec::with_capacity(splits.len());
    let mut aucs = Vec::with_capacity(splits.len());

    for split in splits {
        let fit = fit_logistic(&split.x_train, &split.y_train, &split.w_train, opts)?;
        let p = fit.predict(&split.x_valid);
        let loss = log_loss(&split.y_valid, &p);
        if !loss.is_finite() {
            return Err(AppError::new(4, "Non-finite validation loss."));
        }
        losses.push(loss);
        if let Some(auc) = roc_auc(&split.y_valid, &p) {
            aucs.push(auc);
        }
    }

    let k = losses.len() as f64;
    let mean = losses.iter().sum::<f64>() / k;
    let std_error = if losses.len() > 1 {
        let var = losses.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / (k - 1.0);
        (var / k).sqrt()
    } else {
        0.0
    };
    let mean_auc = if aucs.is_empty() {
        None
    } else {
        Some(aucs.iter().sum::<f64>() / aucs.len() as f64)
    };

    Ok(CvResult {
        lambda: opts.lambda,
        mean_log_loss: mean,
        std_error,
        mean_auc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::split::stratified_folds;

    fn cv(lambda: f64, loss: f64, se: f64) -> CvResult {
        CvResult {
            lambda,
            mean_log_loss: loss,
            std_error: se,
            mean_auc: None,
        }
    }

    #[test]
    fn one_se_rule_prefers_larger_lambda() {
        let results = vec![
            cv(0.001, 0.50, 0.02),
            cv(0.01, 0.48, 0.02),
            cv(0.1, 0.49, 0.02),
            cv(1.0, 0.55, 0.02),
        ];
        let (best, chosen) = one_standard_error(&results);
        assert_eq!(best, 1);
        assert_eq!(chosen, 2);
    }

    #[test]
    fn one_se_rule_keeps_best_without_near_ties() {
        let results = vec![cv(0.01, 0.40, 0.001), cv(0.1, 0.45, 0.001)];
        assert_eq!(one_standard_error(&results), (0, 0));
    }

    #[test]
    fn select_lambda_scores_every_candidate() {
        // Noisy but informative single feature.
        let n = 60;
        let xs: Vec<f64> = (0..n).map(|i| (i as f64 - 30.0) / 10.0).collect();
        let y: Vec<f64> = (0..n)
            .map(|i| if (i * 7) % 11 < 3 || i > 40 { 1.0 } else { 0.0 })
            .collect();
        let x = DMatrix::from_column_slice(n, 1, &xs);
        let folds = stratified_folds(&y, 3, 1).unwrap();

        let weights = vec![1.0; n];
        let data = CvData {
            x: &x,
            y: &y,
            weights: &weights,
            folds: &folds,
            k: 3,
        };

        let grid = [1e-3, 1e-1, 10.0];
        let sel = select_lambda(&data, &grid, 50, 1e-8).unwrap();
        assert_eq!(sel.results.len(), 3);
        assert!(sel.results.iter().all(|r| r.mean_log_loss.is_finite()));
        assert!(grid.contains(&sel.lambda));
        assert!(sel.chosen >= sel.best);
    }

    #[test]
    fn select_lambda_rejects_mismatched_weights() {
        let x = DMatrix::from_column_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let y = [0.0, 1.0, 0.0, 1.0];
        let data = CvData {
            x: &x,
            y: &y,
            weights: &[1.0, 1.0],
            folds: &[0, 0, 1, 1],
            k: 2,
        };
        let err = select_lambda(&data, &[0.1], 50, 1e-8).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
