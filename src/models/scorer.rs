//! Applicant scoring against a saved model.
//!
//! A `Scorer` is immutable once built; the HTTP server shares a single
//! instance across workers behind an `Arc`.

use crate::domain::{
    ApplicantRecord, Decision, ModelArtifact, ModelSummary, RiskGrade, RiskScore, ScoredApplicant,
};
use crate::error::AppError;
use crate::io::table::{Column, Frame};
use crate::models::features::InvalidFeature;

/// Number of explanatory factors attached to each score.
pub const TOP_FACTORS: usize = 5;

#[derive(Debug, Clone)]
pub struct Scorer {
    artifact: ModelArtifact,
}

impl Scorer {
    /// Validate an artifact and wrap it for scoring.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, AppError> {
        let width = artifact.pipeline.width();
        if artifact.model.len() != width {
            return Err(AppError::new(
                2,
                format!(
                    "Model has {} coefficients but the feature pipeline produces {width} columns.",
                    artifact.model.len()
                ),
            ));
        }
        let finite = artifact.model.intercept.is_finite()
            && artifact.model.coefficients.iter().all(|c| c.weight.is_finite());
        if !finite {
            return Err(AppError::new(4, "Model contains non-finite coefficients."));
        }
        if !(0.0..=1.0).contains(&artifact.threshold) {
            return Err(AppError::new(
                2,
                format!("Decision threshold {} is outside [0, 1].", artifact.threshold),
            ));
        }
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn summary(&self) -> ModelSummary {
        self.artifact.summary()
    }

    pub fn threshold(&self) -> f64 {
        self.artifact.threshold
    }

    /// Score one applicant.
    pub fn score(&self, record: &ApplicantRecord) -> Result<RiskScore, InvalidFeature> {
        let x = self.artifact.pipeline.encode_record(record)?;
        Ok(self.score_encoded(record.id_label(), &x))
    }

    fn score_encoded(&self, id: Option<String>, x: &[f64]) -> RiskScore {
        let model = &self.artifact.model;
        let probability = model.predict_proba(x);
        let threshold = self.artifact.threshold;
        RiskScore {
            id,
            probability,
            decision: Decision::from_probability(probability, threshold),
            grade: RiskGrade::from_probability(probability),
            threshold,
            top_factors: model.top_contributions(x, TOP_FACTORS),
        }
    }

    /// Score every row of a table.
    ///
    /// Rows without an id get their 1-based row number as id. When the table
    /// carries the model's target column, 0/1 values are attached as labels.
    pub fn score_frame(&self, frame: &Frame) -> Result<Vec<ScoredApplicant>, AppError> {
        let id_column = self.artifact.id_column.as_str();
        let labels = frame_labels(frame, &self.artifact.target_column);

        let mut out = Vec::with_capacity(frame.n_rows());
        for row in 0..frame.n_rows() {
            let record = record_from_frame_row(frame, row, id_column);
            let score = self
                .score(&record)
                .map_err(|e| AppError::from(e).context(format!("line {}", row + 2)))?;
            let id = score.id.clone().unwrap_or_else(|| (row + 1).to_string());
            out.push(ScoredApplicant {
                id,
                score,
                label: labels[row],
            });
        }
        Ok(out)
    }
}

/// Build an `ApplicantRecord` from one table row.
pub fn record_from_frame_row(frame: &Frame, row: usize, id_column: &str) -> ApplicantRecord {
    let mut record = ApplicantRecord::default();
    for (name, column) in frame.columns() {
        if name == id_column {
            record.id = Some(column.value(row));
        } else {
            record.features.insert(name.to_string(), column.value(row));
        }
    }
    record
}

/// 0/1 outcome per row; `None` when the column is absent or the value is not binary.
pub fn frame_labels(frame: &Frame, target_column: &str) -> Vec<Option<f64>> {
    match frame.column(target_column) {
        Some(Column::Numeric(v)) => v
            .iter()
            .map(|y| y.filter(|y| *y == 0.0 || *y == 1.0))
            .collect(),
        _ => vec![None; frame.n_rows()],
    }
}
