//! Reporting utilities: score summaries, rankings and formatted output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Decision, RiskGrade, RiskScore, ScoredApplicant};

pub mod format;

pub use format::*;

/// Aggregate view of a batch of scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub declined: usize,
    pub mean_probability: f64,
    pub threshold: f64,
    #[serde(skip)]
    pub grades: BTreeMap<RiskGrade, usize>,
}

impl ScoreSummary {
    pub fn decline_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.declined as f64 / self.count as f64
        }
    }
}

/// Summarize scores at `threshold` (which may differ from the one they were scored with).
pub fn summarize<'a, I>(scores: I, threshold: f64) -> ScoreSummary
where
    I: IntoIterator<Item = &'a RiskScore>,
{
    let mut count = 0;
    let mut declined = 0;
    let mut sum = 0.0;
    let mut grades = BTreeMap::new();
    for s in scores {
        count += 1;
        sum += s.probability;
        if Decision::from_probability(s.probability, threshold) == Decision::Decline {
            declined += 1;
        }
        *grades.entry(s.grade).or_insert(0) += 1;
    }
    ScoreSummary {
        count,
        declined,
        mean_probability: if count == 0 { 0.0 } else { sum / count as f64 },
        threshold,
        grades,
    }
}

/// The `top_n` highest-probability applicants (ties keep input order).
pub fn riskiest(scored: &[ScoredApplicant], top_n: usize) -> Vec<&ScoredApplicant> {
    let mut sorted: Vec<&ScoredApplicant> = scored.iter().collect();
    sorted.sort_by(|a, b| b.score.probability.total_cmp(&a.score.probability));
    sorted.truncate(top_n);
    sorted
}
