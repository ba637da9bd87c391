//! Training data ingest.
//!
//! This module turns a prepared applicant CSV into the rows the trainer can
//! use: a typed feature table, binary labels and per-row errors.
//!
//! - **Strict schema** for the target column (clear errors + exit code 2)
//! - **Row-level validation** (skip rows with a bad target, but report them)
//! - No fitting logic here

use std::path::Path;

use tracing::{debug, warn};

use crate::domain::FieldValue;
use crate::error::AppError;
use crate::io::table::Frame;

/// Summary stats about the rows actually used for training.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub n_columns: usize,
    pub positives: usize,
    pub base_rate: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: usable rows + labels + row errors.
#[derive(Debug, Clone)]
pub struct TrainingData {
    /// Usable rows only (bad-target rows removed).
    pub frame: Frame,
    pub labels: Vec<f64>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl TrainingData {
    pub fn rows_used(&self) -> usize {
        self.labels.len()
    }
}

/// Load a prepared CSV for training.
pub fn load_training_data(
    path: &Path,
    id_column: &str,
    target_column: &str,
) -> Result<TrainingData, AppError> {
    let frame = Frame::read_csv(path)?;
    from_frame(frame, id_column, target_column)
}

/// Validate targets and ids of an already-loaded table.
pub fn from_frame(frame: Frame, id_column: &str, target_column: &str) -> Result<TrainingData, AppError> {
    let target = frame.column(target_column).ok_or_else(|| {
        AppError::new(2, format!("Missing required target column: `{target_column}`"))
    })?;
    let id_col = frame.column(id_column);
    if id_col.is_none() {
        warn!(column = %id_column, "id column not found; row errors will carry no ids");
    }

    let rows_read = frame.n_rows();
    let mut keep = Vec::with_capacity(rows_read);
    let mut labels = Vec::with_capacity(rows_read);
    let mut row_errors = Vec::new();

    for row in 0..rows_read {
        // +2: header line plus 1-based numbering.
        let line = row + 2;
        let id = id_col.and_then(|c| c.label(row));
        match parse_target(&target.value(row)) {
            Ok(y) => {
                keep.push(row);
                labels.push(y);
            }
            Err(message) => row_errors.push(RowError { line, id, message }),
        }
    }

    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), "rows with missing or invalid target skipped");
    }

    let frame = frame.select_rows(&keep);
    let positives = labels.iter().filter(|&&y| y == 1.0).count();
    let stats = DatasetStats {
        n_rows: labels.len(),
        n_columns: frame.n_cols(),
        positives,
        base_rate: if labels.is_empty() {
            0.0
        } else {
            positives as f64 / labels.len() as f64
        },
    };
    debug!(rows = stats.n_rows, positives, "training data loaded");

    Ok(TrainingData {
        frame,
        labels,
        stats,
        row_errors,
        rows_read,
    })
}

fn parse_target(value: &FieldValue) -> Result<f64, String> {
    let v = match value {
        FieldValue::Null => return Err("missing target".to_string()),
        FieldValue::Number(v) => *v,
        FieldValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        FieldValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid target value \"{s}\" (expected 0 or 1)"))?,
    };
    if v == 0.0 || v == 1.0 {
        Ok(v)
    } else {
        Err(format!("invalid target value {v} (expected 0 or 1)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_targets_become_row_errors() {
        let frame = Frame::from_reader(
            "SK_ID_CURR,TARGET,AMT\n\
             1,0,10\n\
             2,,20\n\
             3,yes,30\n\
             4,1,40\n\
             5,2,50\n"
                .as_bytes(),
            "test",
        )
        .unwrap();

        let data = from_frame(frame, "SK_ID_CURR", "TARGET").unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used(), 2);
        assert_eq!(data.labels, vec![0.0, 1.0]);
        assert_eq!(data.frame.n_rows(), 2);

        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 6]);
        assert_eq!(data.row_errors[1].id.as_deref(), Some("3"));
        assert_eq!(data.stats.base_rate, 0.5);
    }

    #[test]
    fn missing_target_column_is_input_error() {
        let frame = Frame::from_reader("SK_ID_CURR,AMT\n1,10\n".as_bytes(), "test").unwrap();
        let err = from_frame(frame, "SK_ID_CURR", "TARGET").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("TARGET"));
    }
}
