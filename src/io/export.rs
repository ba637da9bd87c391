//! Export scored applicants to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::ScoredApplicant;
use crate::error::AppError;

/// Write `id,probability,decision,grade` rows (plus `label` when any row has one).
pub fn write_scores_csv(path: &Path, scored: &[ScoredApplicant]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create scores CSV '{}': {e}", path.display())))?;
    write_scores(file, scored)
}

pub fn write_scores<W: Write>(writer: W, scored: &[ScoredApplicant]) -> Result<(), AppError> {
    let with_label = scored.iter().any(|s| s.label.is_some());
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["id", "probability", "decision", "grade"];
    if with_label {
        header.push("label");
    }
    csv.write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write scores CSV header: {e}")))?;

    for s in scored {
        let mut row = vec![
            s.id.clone(),
            format!("{:.6}", s.score.probability),
            s.score.decision.as_str().to_string(),
            s.score.grade.as_str().to_string(),
        ];
        if with_label {
            row.push(s.label.map(|y| format!("{y}")).unwrap_or_default());
        }
        csv.write_record(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write scores CSV row: {e}")))?;
    }

    csv.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush scores CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decision, RiskGrade, RiskScore};

    fn scored(id: &str, p: f64, label: Option<f64>) -> ScoredApplicant {
        ScoredApplicant {
            id: id.to_string(),
            score: RiskScore {
                id: Some(id.to_string()),
                probability: p,
                decision: Decision::from_probability(p, 0.5),
                grade: RiskGrade::from_probability(p),
                threshold: 0.5,
                top_factors: Vec::new(),
            },
            label,
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let mut buf = Vec::new();
        write_scores(&mut buf, &[scored("100002", 0.0312, None), scored("100003", 0.61, None)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "id,probability,decision,grade\n\
             100002,0.031200,approve,A\n\
             100003,0.610000,decline,E\n"
        );
    }

    #[test]
    fn label_column_only_when_present() {
        let mut buf = Vec::new();
        write_scores(&mut buf, &[scored("1", 0.2, Some(1.0)), scored("2", 0.1, None)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("id,probability,decision,grade,label\n"));
        assert!(text.contains("1,0.200000,approve,D,1\n"));
        assert!(text.ends_with("2,0.100000,approve,C,\n"));
    }
}
