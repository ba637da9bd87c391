//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::{EvalRun, TrainRun};
use crate::domain::{CvResult, ScoredApplicant, TrainConfig};
use crate::eval::EvalMetrics;
use crate::models::LogisticModel;
use crate::report::ScoreSummary;

/// Format the full training report (dataset + CV + metrics + coefficients).
pub fn format_train_report(run: &TrainRun, config: &TrainConfig) -> String {
    let mut out = String::new();
    let data = &run.data;

    out.push_str("=== crs - Credit Risk Model Training ===\n");
    out.push_str(&format!("Input: {}\n", config.input.display()));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={} | columns={}\n",
        data.rows_read,
        data.rows_used(),
        data.row_errors.len(),
        data.stats.n_columns,
    ));
    out.push_str(&format!(
        "Target: {} | positives={} | base rate={:.2}%\n",
        config.target_column,
        data.stats.positives,
        100.0 * data.stats.base_rate,
    ));
    out.push_str(&format!(
        "Split: train={} holdout={} (seed={}) | features={}\n",
        run.split.train.len(),
        run.split.holdout.len(),
        config.seed,
        run.artifact.pipeline.width(),
    ));
    for e in data.row_errors.iter().take(5) {
        out.push_str(&format!(
            "  (skipped line {}{}) {}\n",
            e.line,
            e.id.as_deref().map(|id| format!(" id={id}")).unwrap_or_default(),
            e.message
        ));
    }
    if data.row_errors.len() > 5 {
        out.push_str(&format!("  ... and {} more\n", data.row_errors.len() - 5));
    }

    out.push_str(&format!("\nCross-validation ({}-fold):\n", config.folds));
    out.push_str(&format_cv_table(
        &run.selection.results,
        run.selection.chosen,
        run.selection.best,
    ));

    out.push_str("\nChosen model:\n");
    out.push_str(&format!("- lambda   : {:.6}\n", run.artifact.lambda));
    out.push_str(&format!(
        "- IRLS     : {} iteration(s){}\n",
        run.iterations,
        if run.converged { "" } else { " (not converged)" }
    ));
    out.push_str(&format!("- intercept: {:.6}\n", run.artifact.model.intercept));

    out.push_str("\nHoldout metrics:\n");
    out.push_str(&format_metrics(&run.artifact.metrics));

    out.push_str(&format!("\nTop {} coefficients (standardized):\n", config.top_n));
    out.push_str(&format_coefficients(&run.artifact.model, config.top_n));

    out
}

/// CV results, one line per λ. `*` marks the chosen λ, `+` the minimum loss.
pub fn format_cv_table(results: &[CvResult], chosen: usize, best: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  {:>12} {:>10} {:>10} {:>8}\n",
        "lambda", "logloss", "std_err", "auc"
    ));
    for (i, r) in results.iter().enumerate() {
        let mark = if i == chosen {
            '*'
        } else if i == best {
            '+'
        } else {
            ' '
        };
        out.push_str(&format!(
            "{mark} {:>12.6} {:>10.5} {:>10.5} {:>8}\n",
            r.lambda,
            r.mean_log_loss,
            r.std_error,
            fmt_opt(r.mean_auc, 4),
        ));
    }
    out
}

pub fn format_metrics(m: &EvalMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "- n={} | positives={} | base rate={:.2}%\n",
        m.n,
        m.positives,
        100.0 * m.base_rate
    ));
    out.push_str(&format!(
        "- AUC={} | Gini={} | KS={}\n",
        fmt_opt(m.auc, 4),
        fmt_opt(m.gini, 4),
        fmt_opt(m.ks, 4)
    ));
    out.push_str(&format!("- log-loss={:.5} | Brier={:.5}\n", m.log_loss, m.brier));
    out.push_str(&format!(
        "- threshold={:.4} | accuracy={:.4} precision={:.4} recall={:.4} F1={:.4}\n",
        m.threshold, m.accuracy, m.precision, m.recall, m.f1
    ));
    let c = &m.confusion;
    out.push_str(&format!(
        "- confusion: TP={} FP={} TN={} FN={}\n",
        c.true_positive, c.false_positive, c.true_negative, c.false_negative
    ));

    if !m.calibration.is_empty() {
        out.push_str("- calibration:\n");
        out.push_str(&format!(
            "  {:<11} {:>7} {:>10} {:>10}\n",
            "bin", "count", "predicted", "observed"
        ));
        for b in &m.calibration {
            out.push_str(&format!(
                "  [{:.1}, {:.1}) {:>7} {:>10.4} {:>10.4}\n",
                b.lower, b.upper, b.count, b.mean_predicted, b.observed_rate
            ));
        }
    }
    out
}

pub fn format_coefficients(model: &LogisticModel, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("  {:<40} {:>12}\n", "feature", "weight"));
    for c in model.ranked_coefficients().into_iter().take(top_n) {
        out.push_str(&format!("  {:<40} {:>12.6}\n", truncate(&c.feature, 40), c.weight));
    }
    out
}

/// Batch scoring summary plus the riskiest applicants.
pub fn format_score_report(scored: &[ScoredApplicant], summary: &ScoreSummary, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Scored: n={} | declined={} ({:.2}%) | mean probability={:.4} | threshold={:.4}\n",
        summary.count,
        summary.declined,
        100.0 * summary.decline_rate(),
        summary.mean_probability,
        summary.threshold,
    ));
    let grades: Vec<String> = summary
        .grades
        .iter()
        .map(|(g, n)| format!("{}={n}", g.as_str()))
        .collect();
    out.push_str(&format!("Grades: {}\n", grades.join(" ")));

    out.push_str(&format!("\nTop {top_n} riskiest:\n"));
    out.push_str(&format_score_table(&crate::report::riskiest(scored, top_n)));
    out
}

fn format_score_table(rows: &[&ScoredApplicant]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:>11} {:<8} {:>5} {:<30}\n",
            "id", "probability", "decision", "grade", "top factor"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<16} {:-<11} {:-<8} {:-<5} {:-<30}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for s in rows {
        let factor = s
            .score
            .top_factors
            .first()
            .map(|f| format!("{} ({:+.3})", f.feature, f.contribution))
            .unwrap_or_default();
        out.push_str(
            format!(
                "{:<16} {:>11.4} {:<8} {:>5} {:<30}\n",
                truncate(&s.id, 16),
                s.score.probability,
                s.score.decision.as_str(),
                s.score.grade.as_str(),
                truncate(&factor, 30),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Evaluation report for `crs evaluate`.
pub fn format_eval_report(run: &EvalRun) -> String {
    let mut out = String::new();
    out.push_str("=== crs - Model Evaluation ===\n");
    out.push_str(&format!(
        "Model: v{} trained {} | lambda={:.6} | features={}\n",
        run.artifact.version,
        run.artifact.created_at.format("%Y-%m-%d %H:%M UTC"),
        run.artifact.lambda,
        run.artifact.pipeline.width(),
    ));
    out.push_str(&format!(
        "Rows: scored={} labelled={}\n\n",
        run.scored.len(),
        run.metrics.n
    ));
    out.push_str(&format_metrics(&run.metrics));
    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}"))
        .unwrap_or_else(|| "n/a".to_string())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coefficient;

    #[test]
    fn cv_table_marks_chosen_and_best() {
        let results = vec![
            CvResult {
                lambda: 0.01,
                mean_log_loss: 0.3,
                std_error: 0.01,
                mean_auc: Some(0.75),
            },
            CvResult {
                lambda: 0.1,
                mean_log_loss: 0.305,
                std_error: 0.01,
                mean_auc: None,
            },
        ];
        let txt = format_cv_table(&results, 1, 0);
        let lines: Vec<&str> = txt.lines().collect();
        assert!(lines[1].starts_with('+'));
        assert!(lines[1].ends_with("0.7500"));
        assert!(lines[2].starts_with('*'));
        assert!(lines[2].ends_with("n/a"));
    }

    #[test]
    fn coefficients_sorted_by_magnitude() {
        let model = LogisticModel {
            intercept: -2.0,
            coefficients: vec![
                Coefficient {
                    feature: "small".to_string(),
                    weight: 0.1,
                },
                Coefficient {
                    feature: "big".to_string(),
                    weight: -0.9,
                },
            ],
        };
        let txt = format_coefficients(&model, 1);
        assert!(txt.contains("big"));
        assert!(!txt.contains("small"));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
