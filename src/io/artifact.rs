//! Read/write model artifact JSON files.
//!
//! The artifact is the portable representation of a trained model:
//! - feature pipeline (medians, scaling, category levels)
//! - intercept and named coefficients
//! - decision threshold, chosen λ, holdout metrics and CV results
//!
//! The schema is defined by `domain::ModelArtifact`.

use std::fs::{File, create_dir_all};
use std::io::BufReader;
use std::path::Path;

use crate::domain::ModelArtifact;
use crate::error::AppError;

/// Write a model JSON file (parent directories are created).
pub fn write_model_json(path: &Path, artifact: &ModelArtifact) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| {
            AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, artifact)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;

    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelArtifact, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid model JSON '{}': {e}", path.display())))?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::eval::evaluate;
    use crate::models::{FeaturePipeline, FeatureSpec, LogisticModel};

    #[test]
    fn model_json_survives_a_write_read_cycle() {
        let pipeline = FeaturePipeline {
            features: vec![FeatureSpec::Categorical {
                name: "CODE_GENDER".to_string(),
                levels: vec!["F".to_string(), "M".to_string()],
            }],
        };
        let artifact = ModelArtifact {
            tool: "crs".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            id_column: "SK_ID_CURR".to_string(),
            target_column: "TARGET".to_string(),
            model: LogisticModel::from_beta(&[-2.0, 0.1, 0.3], &pipeline.names()).unwrap(),
            pipeline,
            lambda: 0.01,
            threshold: 0.3,
            metrics: evaluate(&[0.0, 1.0, 0.0], &[0.1, 0.7, 0.4], 0.3).unwrap(),
            cv: Vec::new(),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        write_model_json(&path, &artifact).unwrap();
        let back = read_model_json(&path).unwrap();

        assert_eq!(back.pipeline, artifact.pipeline);
        assert_eq!(back.model, artifact.model);
        assert_eq!(back.metrics, artifact.metrics);
        assert_eq!(back.created_at, artifact.created_at);
    }

    #[test]
    fn invalid_json_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{\"tool\": 1}").unwrap();
        assert_eq!(read_model_json(&path).unwrap_err().exit_code(), 2);
    }
}
