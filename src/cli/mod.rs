//! Command-line parsing for the credit risk scorer.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{ClassWeight, ThresholdMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "crs", version, about = "Credit risk scoring: prepare data, train, score, serve")]
pub struct Cli {
    /// Log output format (logs go to stderr; filter with RUST_LOG).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a synthetic raw dataset (application, bureau, previous, installments).
    Sample(SampleArgs),
    /// Aggregate the raw tables into cleaned train/test feature files.
    Prepare(PrepareArgs),
    /// Train a default-probability model and save it as JSON.
    Train(TrainArgs),
    /// Evaluate a saved model on a labelled CSV.
    Evaluate(EvaluateArgs),
    /// Score a CSV with a saved model.
    Score(ScoreArgs),
    /// Serve the scoring API over HTTP.
    Serve(ServeArgs),
    /// Launch the interactive risk dashboard.
    Dashboard(DashboardArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Output directory for the raw CSV files.
    #[arg(long, default_value = "data/raw")]
    pub out: PathBuf,

    /// Number of applicants (split into train/test).
    #[arg(short = 'n', long, default_value_t = 2000)]
    pub applicants: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Share of applicants written to the unlabelled test file.
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,
}

#[derive(Debug, Args, Clone)]
pub struct PrepareArgs {
    /// Directory holding the raw CSV files.
    #[arg(long, default_value = "data/raw")]
    pub raw: PathBuf,

    /// Directory for `train_clean.csv` and `test_clean.csv`.
    #[arg(long, default_value = "data/processed")]
    pub out: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// Prepared training CSV.
    #[arg(long, default_value = "data/processed/train_clean.csv")]
    pub input: PathBuf,

    /// Where to write the model JSON.
    #[arg(long, default_value = "models/model.json")]
    pub model_out: PathBuf,

    /// Applicant id column.
    #[arg(long, default_value = "SK_ID_CURR")]
    pub id_column: String,

    /// Binary target column (1 = default).
    #[arg(long, default_value = "TARGET")]
    pub target: String,

    /// Columns to leave out of the model (repeatable).
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Maximum one-hot levels per categorical column.
    #[arg(long, default_value_t = 20)]
    pub max_categories: usize,

    /// Holdout share.
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Random seed for the split and CV folds.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Cross-validation folds.
    #[arg(long, default_value_t = 5)]
    pub folds: usize,

    /// Smallest L2 penalty in the search grid.
    #[arg(long, default_value_t = 1e-4)]
    pub lambda_min: f64,

    /// Largest L2 penalty in the search grid.
    #[arg(long, default_value_t = 10.0)]
    pub lambda_max: f64,

    /// Number of log-spaced penalties.
    #[arg(long, default_value_t = 9)]
    pub lambda_steps: usize,

    /// IRLS iteration cap.
    #[arg(long, default_value_t = 50)]
    pub max_iter: usize,

    /// IRLS convergence tolerance on the largest coefficient change.
    #[arg(long, default_value_t = 1e-8)]
    pub tol: f64,

    /// Observation weighting.
    #[arg(long, value_enum, default_value_t = ClassWeight::None)]
    pub class_weight: ClassWeight,

    /// How the decision threshold is chosen.
    #[arg(long, value_enum, default_value_t = ThresholdMode::Fixed)]
    pub threshold_mode: ThresholdMode,

    /// Decision threshold for `--threshold-mode fixed`.
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Coefficients shown in the report.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Render an ASCII ROC plot of the holdout set.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 60)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export holdout scores to CSV.
    #[arg(long)]
    pub export_holdout: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct EvaluateArgs {
    /// Model JSON produced by `crs train`.
    #[arg(long, default_value = "models/model.json")]
    pub model: PathBuf,

    /// Labelled CSV (must carry the model's target column).
    #[arg(long)]
    pub input: PathBuf,

    /// Render an ASCII ROC plot.
    #[arg(long)]
    pub plot: bool,

    #[arg(long, default_value_t = 60)]
    pub width: usize,

    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    /// Model JSON produced by `crs train`.
    #[arg(long, default_value = "models/model.json")]
    pub model: PathBuf,

    /// CSV of applicants to score.
    #[arg(long)]
    pub input: PathBuf,

    /// Output CSV (`id,probability,decision,grade`).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Riskiest applicants shown in the summary.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "CRS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "CRS_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "CRS_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Model JSON produced by `crs train`.
    #[arg(long, env = "CRS_MODEL", default_value = "models/model.json")]
    pub model: PathBuf,

    /// Largest accepted `/score/batch` request.
    #[arg(long, env = "CRS_MAX_BATCH", default_value_t = 1000)]
    pub max_batch: usize,
}

#[derive(Debug, Args, Clone)]
pub struct DashboardArgs {
    /// CSV of applicants to score and display.
    #[arg(long)]
    pub input: PathBuf,

    /// Model JSON for in-process scoring.
    #[arg(long, default_value = "models/model.json", conflicts_with = "remote")]
    pub model: PathBuf,

    /// Base URL of a running `crs serve` (e.g. http://127.0.0.1:8080).
    #[arg(long)]
    pub remote: Option<String>,

    /// Applicants per remote batch request (capped by the service's limit).
    #[arg(long, requires = "remote")]
    pub chunk: Option<usize>,
}
