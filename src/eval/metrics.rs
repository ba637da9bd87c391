//! Binary classification metrics for default-probability models.
//!
//! All functions take observed labels `y ∈ {0, 1}` and predicted default
//! probabilities `p` of the same length. A row is *predicted positive*
//! (declined) when `p >= threshold`.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::log_loss_term;

/// Equal-width probability bins in the calibration table.
pub const CALIBRATION_BINS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        safe_div(
            (self.true_positive + self.true_negative) as f64,
            self.total() as f64,
        )
    }

    pub fn precision(&self) -> f64 {
        safe_div(
            self.true_positive as f64,
            (self.true_positive + self.false_positive) as f64,
        )
    }

    pub fn recall(&self) -> f64 {
        safe_div(
            self.true_positive as f64,
            (self.true_positive + self.false_negative) as f64,
        )
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        safe_div(2.0 * p * r, p + r)
    }

    pub fn false_positive_rate(&self) -> f64 {
        safe_div(
            self.false_positive as f64,
            (self.false_positive + self.true_negative) as f64,
        )
    }

    /// `(fpr, tpr)`: where this threshold sits on the ROC curve.
    pub fn operating_point(&self) -> (f64, f64) {
        (self.false_positive_rate(), self.recall())
    }
}

/// One operating point of the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    /// Rows with `p >= threshold` are predicted positive.
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_predicted: f64,
    pub observed_rate: f64,
}

/// Holdout evaluation stored in the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub n: usize,
    pub positives: usize,
    pub base_rate: f64,
    /// `None` when only one class is present.
    pub auc: Option<f64>,
    pub gini: Option<f64>,
    pub ks: Option<f64>,
    pub log_loss: f64,
    pub brier: f64,
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    #[serde(default)]
    pub calibration: Vec<CalibrationBin>,
}

/// Compute the full metric set at a decision threshold.
pub fn evaluate(y: &[f64], p: &[f64], threshold: f64) -> Result<EvalMetrics, AppError> {
    check_inputs(y, p)?;

    let n = y.len();
    let positives = y.iter().filter(|&&v| v == 1.0).count();
    let auc = roc_auc(y, p);
    let confusion = confusion_at(y, p, threshold);

    Ok(EvalMetrics {
        n,
        positives,
        base_rate: positives as f64 / n as f64,
        auc,
        gini: auc.map(|a| 2.0 * a - 1.0),
        ks: ks_statistic(y, p),
        log_loss: log_loss(y, p),
        brier: brier_score(y, p),
        threshold,
        confusion,
        accuracy: confusion.accuracy(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        calibration: calibration_table(y, p, CALIBRATION_BINS),
    })
}

fn check_inputs(y: &[f64], p: &[f64]) -> Result<(), AppError> {
    if y.len() != p.len() {
        return Err(AppError::new(
            4,
            format!("Label/prediction length mismatch: {} vs {}.", y.len(), p.len()),
        ));
    }
    if y.is_empty() {
        return Err(AppError::new(3, "No rows to evaluate."));
    }
    if p.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "Non-finite predicted probability."));
    }
    Ok(())
}

/// Rank-based ROC AUC (Mann-Whitney U) with tied scores sharing their mean rank.
pub fn roc_auc(y: &[f64], p: &[f64]) -> Option<f64> {
    let n_pos = y.iter().filter(|&&v| v == 1.0).count();
    let n_neg = y.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..p.len()).collect();
    order.sort_by(|&a, &b| p[a].total_cmp(&p[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && p[order[j + 1]] == p[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; the tie group [i, j] shares the average rank.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y[idx] == 1.0 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// ROC curve from `(0, 0)` to `(1, 1)`, one point per distinct score (descending).
///
/// The first point has an infinite threshold (nothing predicted positive).
pub fn roc_curve(y: &[f64], p: &[f64]) -> Vec<RocPoint> {
    let n_pos = y.iter().filter(|&&v| v == 1.0).count() as f64;
    let n_neg = y.len() as f64 - n_pos;

    let mut order: Vec<usize> = (0..p.len()).collect();
    order.sort_by(|&a, &b| p[b].total_cmp(&p[a]));

    let mut out = vec![RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    }];
    let (mut tp, mut fp) = (0.0, 0.0);
    let mut i = 0;
    while i < order.len() {
        let score = p[order[i]];
        while i < order.len() && p[order[i]] == score {
            if y[order[i]] == 1.0 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        out.push(RocPoint {
            threshold: score,
            fpr: safe_div(fp, n_neg),
            tpr: safe_div(tp, n_pos),
        });
    }
    out
}

/// Kolmogorov-Smirnov statistic: `max(TPR - FPR)` over all thresholds.
pub fn ks_statistic(y: &[f64], p: &[f64]) -> Option<f64> {
    roc_auc(y, p)?;
    roc_curve(y, p)
        .iter()
        .map(|pt| pt.tpr - pt.fpr)
        .max_by(f64::total_cmp)
}

/// Threshold maximizing Youden's J (`TPR - FPR`); ties keep the higher threshold.
pub fn youden_threshold(y: &[f64], p: &[f64]) -> Option<f64> {
    roc_auc(y, p)?;
    let mut best: Option<(f64, f64)> = None;
    for pt in roc_curve(y, p).into_iter().skip(1) {
        let j = pt.tpr - pt.fpr;
        if best.is_none_or(|(best_j, _)| j > best_j) {
            best = Some((j, pt.threshold));
        }
    }
    best.map(|(_, t)| t)
}

/// Mean binary cross-entropy with probabilities clipped to `[1e-15, 1 - 1e-15]`.
pub fn log_loss(y: &[f64], p: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().zip(p).map(|(&yi, &pi)| log_loss_term(yi, pi)).sum::<f64>() / y.len() as f64
}

pub fn brier_score(y: &[f64], p: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().zip(p).map(|(&yi, &pi)| (pi - yi).powi(2)).sum::<f64>() / y.len() as f64
}

pub fn confusion_at(y: &[f64], p: &[f64], threshold: f64) -> ConfusionMatrix {
    let mut cm = ConfusionMatrix::default();
    for (&yi, &pi) in y.iter().zip(p) {
        match (pi >= threshold, yi == 1.0) {
            (true, true) => cm.true_positive += 1,
            (true, false) => cm.false_positive += 1,
            (false, false) => cm.true_negative += 1,
            (false, true) => cm.false_negative += 1,
        }
    }
    cm
}

/// Equal-width calibration bins over `[0, 1]`; empty bins are omitted.
pub fn calibration_table(y: &[f64], p: &[f64], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(1);
    let mut sums = vec![(0usize, 0.0, 0.0); bins];
    for (&yi, &pi) in y.iter().zip(p) {
        let idx = ((pi.clamp(0.0, 1.0) * bins as f64) as usize).min(bins - 1);
        let slot = &mut sums[idx];
        slot.0 += 1;
        slot.1 += pi;
        slot.2 += yi;
    }

    sums.into_iter()
        .enumerate()
        .filter(|(_, (count, _, _))| *count > 0)
        .map(|(i, (count, sum_p, sum_y))| CalibrationBin {
            lower: i as f64 / bins as f64,
            upper: (i + 1) as f64 / bins as f64,
            count,
            mean_predicted: sum_p / count as f64,
            observed_rate: sum_y / count as f64,
        })
        .collect()
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auc_perfect_random_and_ties() {
        let y = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
        assert_eq!(roc_auc(&y, &[0.5, 0.5, 0.5, 0.5]), Some(0.5));
        // One positive/negative pair tied, three ordered correctly.
        assert_eq!(roc_auc(&y, &[0.1, 0.6, 0.6, 0.9]), Some(0.875));
        assert_eq!(roc_auc(&[1.0, 1.0], &[0.2, 0.3]), None);
    }

    #[test]
    fn roc_curve_spans_unit_square() {
        let y = [0.0, 1.0, 0.0, 1.0];
        let curve = roc_curve(&y, &[0.1, 0.4, 0.35, 0.8]);
        assert_eq!(curve.first().map(|p| (p.fpr, p.tpr)), Some((0.0, 0.0)));
        assert_eq!(curve.last().map(|p| (p.fpr, p.tpr)), Some((1.0, 1.0)));
        assert_eq!(curve.len(), 5);
    }

    #[test]
    fn youden_and_ks_agree() {
        let y = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let p = [0.05, 0.1, 0.2, 0.3, 0.6, 0.65, 0.9];
        let t = youden_threshold(&y, &p).unwrap();
        assert_eq!(t, 0.3);
        let cm = confusion_at(&y, &p, t);
        let j = cm.recall() - cm.false_positive as f64 / 4.0;
        assert!((ks_statistic(&y, &p).unwrap() - j).abs() < 1e-12);
    }

    #[test]
    fn confusion_ratios_handle_zero_division() {
        let cm = confusion_at(&[0.0, 0.0], &[0.1, 0.2], 0.5);
        assert_eq!(cm.true_negative, 2);
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.recall(), 0.0);
        assert_eq!(cm.f1(), 0.0);
        assert_eq!(cm.accuracy(), 1.0);
    }

    #[test]
    fn evaluate_reports_scalar_metrics() {
        let y = [0.0, 1.0, 0.0, 1.0];
        let p = [0.2, 0.7, 0.4, 1.0];
        let m = evaluate(&y, &p, 0.5).unwrap();

        assert_eq!(m.n, 4);
        assert_eq!(m.base_rate, 0.5);
        assert_eq!(m.auc, Some(1.0));
        assert_eq!(m.gini, Some(1.0));
        assert!((m.brier - (0.04 + 0.09 + 0.16 + 0.0) / 4.0).abs() < 1e-12);
        assert!(m.log_loss.is_finite());
        assert_eq!(m.accuracy, 1.0);
        // p = 1.0 lands in the last bin.
        assert_eq!(m.calibration.last().map(|b| b.count), Some(1));
        assert!(evaluate(&[], &[], 0.5).is_err());
    }
}
