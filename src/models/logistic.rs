//! Logistic regression model evaluation.
//!
//! The fitted model is a plain linear predictor on the encoded design row:
//!
//! ```text
//! logit(p) = intercept + Σ_j w_j x_j
//! ```
//!
//! Fitting lives in `fit::trainer`; this module only evaluates.

use serde::{Deserialize, Serialize};

use crate::domain::RiskFactor;
use crate::math::sigmoid;

/// A named coefficient on one design column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub feature: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Vec<Coefficient>,
}

impl LogisticModel {
    /// Build from a solver vector laid out as `[intercept, w_1, .., w_p]`.
    pub fn from_beta(beta: &[f64], names: &[String]) -> Option<Self> {
        let (&intercept, weights) = beta.split_first()?;
        if weights.len() != names.len() {
            return None;
        }
        Some(Self {
            intercept,
            coefficients: names
                .iter()
                .zip(weights)
                .map(|(feature, &weight)| Coefficient {
                    feature: feature.clone(),
                    weight,
                })
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Log-odds for an encoded row.
    pub fn logit(&self, x: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(c, v)| c.weight * v)
                .sum::<f64>()
    }

    /// Default probability for an encoded row, always in `[0, 1]`.
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let p = sigmoid(self.logit(x));
        if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.5 }
    }

    /// The `top_n` largest per-feature log-odds contributions by magnitude.
    ///
    /// Zero contributions are omitted; ties break on feature name.
    pub fn top_contributions(&self, x: &[f64], top_n: usize) -> Vec<RiskFactor> {
        let mut factors: Vec<RiskFactor> = self
            .coefficients
            .iter()
            .zip(x)
            .map(|(c, v)| RiskFactor {
                feature: c.feature.clone(),
                contribution: c.weight * v,
            })
            .filter(|f| f.contribution != 0.0 && f.contribution.is_finite())
            .collect();
        factors.sort_by(|a, b| {
            b.contribution
                .abs()
                .total_cmp(&a.contribution.abs())
                .then_with(|| a.feature.cmp(&b.feature))
        });
        factors.truncate(top_n);
        factors
    }

    /// Coefficients sorted by absolute weight (largest first).
    pub fn ranked_coefficients(&self) -> Vec<&Coefficient> {
        let mut out: Vec<&Coefficient> = self.coefficients.iter().collect();
        out.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LogisticModel {
        LogisticModel::from_beta(
            &[-1.0, 2.0, -0.5, 0.0],
            &["a".to_string(), "b".to_string(), "c".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn from_beta_checks_length() {
        assert!(LogisticModel::from_beta(&[1.0, 2.0], &[]).is_none());
        assert!(LogisticModel::from_beta(&[], &[]).is_none());
    }

    #[test]
    fn predict_proba_matches_sigmoid_of_logit() {
        let m = model();
        let x = [0.5, 2.0, 7.0];
        assert!((m.logit(&x) - (-1.0 + 1.0 - 1.0)).abs() < 1e-12);
        assert!((m.predict_proba(&x) - sigmoid(-1.0)).abs() < 1e-12);
    }

    #[test]
    fn contributions_are_ranked_by_magnitude() {
        let m = model();
        let factors = m.top_contributions(&[0.1, 4.0, 9.0], 5);
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[0].feature, "b");
        assert_eq!(factors[0].contribution, -2.0);
        assert_eq!(factors[1].feature, "a");
    }
}
