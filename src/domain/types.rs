//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during training and scoring
//! - exported to JSON/CSV
//! - sent over the scoring API and reloaded by the dashboard

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::eval::EvalMetrics;
use crate::models::{FeaturePipeline, LogisticModel};

/// A single applicant attribute as it arrives from a CSV cell or a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl FieldValue {
    /// Render the value as a plain label (used for ids and categorical levels).
    pub fn to_label(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() { None } else { Some(s.to_string()) }
            }
            FieldValue::Number(v) if v.is_finite() => Some(format!("{v}")),
            FieldValue::Number(_) => None,
            FieldValue::Bool(b) => Some(b.to_string()),
        }
    }
}

/// An applicant as seen by the scorer: an optional id plus raw attributes.
///
/// Attributes not known to the model are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FieldValue>,
    #[serde(default)]
    pub features: BTreeMap<String, FieldValue>,
}

impl ApplicantRecord {
    pub fn id_label(&self) -> Option<String> {
        self.id.as_ref().and_then(FieldValue::to_label)
    }
}

/// Binary underwriting decision derived from the probability and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Decision::Decline
        } else {
            Decision::Approve
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Decline => "decline",
        }
    }
}

/// Coarse risk grade for human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskGrade {
    A,
    B,
    C,
    D,
    E,
}

/// Upper probability bounds (exclusive) for grades A..D; everything else is E.
pub const GRADE_BOUNDS: [(RiskGrade, f64); 4] = [
    (RiskGrade::A, 0.05),
    (RiskGrade::B, 0.10),
    (RiskGrade::C, 0.20),
    (RiskGrade::D, 0.35),
];

impl RiskGrade {
    pub fn from_probability(p: f64) -> Self {
        for (grade, upper) in GRADE_BOUNDS {
            if p < upper {
                return grade;
            }
        }
        RiskGrade::E
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskGrade::A => "A",
            RiskGrade::B => "B",
            RiskGrade::C => "C",
            RiskGrade::D => "D",
            RiskGrade::E => "E",
        }
    }
}

/// Signed contribution of one feature to the applicant's log-odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub feature: String,
    pub contribution: f64,
}

/// Model output for one applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Estimated default probability in `[0, 1]`.
    pub probability: f64,
    pub decision: Decision,
    pub grade: RiskGrade,
    pub threshold: f64,
    #[serde(default)]
    pub top_factors: Vec<RiskFactor>,
}

/// An applicant scored in bulk (CSV scoring, dashboard).
#[derive(Debug, Clone)]
pub struct ScoredApplicant {
    pub id: String,
    pub score: RiskScore,
    /// Observed outcome (0/1) when the input carries a target column.
    pub label: Option<f64>,
}

/// How the decision threshold is chosen after training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    /// Use `--threshold` as given.
    Fixed,
    /// Maximize `TPR - FPR` on the holdout set.
    Youden,
}

/// Per-class observation weighting in the training objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Every row counts once.
    None,
    /// Reweight so both classes carry equal total weight.
    Balanced,
}

/// A full training run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub input: PathBuf,
    pub model_out: PathBuf,
    pub id_column: String,
    pub target_column: String,
    pub exclude: Vec<String>,
    pub max_categories: usize,

    pub test_fraction: f64,
    pub seed: u64,
    pub folds: usize,

    pub lambda_min: f64,
    pub lambda_max: f64,
    pub lambda_steps: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub class_weight: ClassWeight,

    pub threshold_mode: ThresholdMode,
    pub threshold: f64,

    pub top_n: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_holdout: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/processed/train_clean.csv"),
            model_out: PathBuf::from("models/model.json"),
            id_column: "SK_ID_CURR".to_string(),
            target_column: "TARGET".to_string(),
            exclude: Vec::new(),
            max_categories: 20,
            test_fraction: 0.2,
            seed: 42,
            folds: 5,
            lambda_min: 1e-4,
            lambda_max: 10.0,
            lambda_steps: 9,
            max_iter: 50,
            tol: 1e-8,
            class_weight: ClassWeight::None,
            threshold_mode: ThresholdMode::Fixed,
            threshold: 0.5,
            top_n: 10,
            plot: false,
            plot_width: 60,
            plot_height: 20,
            export_holdout: None,
        }
    }
}

/// Cross-validation outcome for one regularization strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResult {
    pub lambda: f64,
    pub mean_log_loss: f64,
    pub std_error: f64,
    pub mean_auc: Option<f64>,
}

/// A saved model (JSON).
///
/// This is everything the scorer needs: the feature pipeline fitted on the
/// training rows, the coefficients, and the decision threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub tool: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub id_column: String,
    pub target_column: String,
    pub pipeline: FeaturePipeline,
    pub model: LogisticModel,
    pub lambda: f64,
    pub threshold: f64,
    pub metrics: EvalMetrics,
    #[serde(default)]
    pub cv: Vec<CvResult>,
}

/// Compact model description served by `GET /model` and shown in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub created_at: DateTime<Utc>,
    pub version: String,
    pub id_column: String,
    pub target_column: String,
    pub feature_count: usize,
    pub lambda: f64,
    pub threshold: f64,
    pub auc: Option<f64>,
    pub log_loss: f64,
    pub base_rate: f64,
}

impl ModelArtifact {
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            created_at: self.created_at,
            version: self.version.clone(),
            id_column: self.id_column.clone(),
            target_column: self.target_column.clone(),
            feature_count: self.pipeline.width(),
            lambda: self.lambda,
            threshold: self.threshold,
            auc: self.metrics.auc,
            log_loss: self.metrics.log_loss,
            base_rate: self.metrics.base_rate,
        }
    }
}
