//! Shared pipeline logic used by the CLI, the server and the dashboard.
//!
//! Keeping this in one place avoids duplicating the core workflows:
//! - training: ingest -> split -> features -> λ search -> refit -> threshold -> metrics
//! - evaluation / batch scoring: artifact -> scorer -> scored applicants
//!
//! The front-ends can then focus on presentation (printing vs widgets vs JSON).

use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{ModelArtifact, ScoredApplicant, ThresholdMode, TrainConfig};
use crate::error::AppError;
use crate::eval::{EvalMetrics, RocPoint, evaluate, roc_curve, youden_threshold};
use crate::fit::{
    CvData, IrlsOptions, LambdaSelection, Split, fit_logistic, lambda_grid, sample_weights,
    select_lambda, stratified_folds, stratified_split,
};
use crate::io::ingest::{TrainingData, load_training_data};
use crate::io::table::Frame;
use crate::io::read_model_json;
use crate::models::{FeaturePipeline, LogisticModel, Scorer};

/// Minimum usable rows before any training is attempted.
pub const MIN_TRAIN_ROWS: usize = 10;

/// All computed outputs of a single `crs train` run.
#[derive(Debug, Clone)]
pub struct TrainRun {
    pub data: TrainingData,
    pub split: Split,
    pub selection: LambdaSelection,
    pub artifact: ModelArtifact,
    /// Holdout rows scored by the final model.
    pub holdout: Vec<ScoredApplicant>,
    pub roc: Vec<RocPoint>,
    pub iterations: usize,
    pub converged: bool,
}

/// Execute the full training pipeline from the configured input file.
pub fn run_train(config: &TrainConfig) -> Result<TrainRun, AppError> {
    validate_config(config)?;
    let data = load_training_data(&config.input, &config.id_column, &config.target_column)?;
    train_on(data, config)
}

/// Execute the training pipeline on already-loaded data.
pub fn train_on(data: TrainingData, config: &TrainConfig) -> Result<TrainRun, AppError> {
    validate_config(config)?;
    check_guardrails(&data, config)?;

    // 1) Stratified holdout split.
    let split = stratified_split(&data.labels, config.test_fraction, config.seed)?;
    let y_train: Vec<f64> = split.train.iter().map(|&i| data.labels[i]).collect();
    let y_holdout: Vec<f64> = split.holdout.iter().map(|&i| data.labels[i]).collect();

    // 2) Feature pipeline on the training portion only.
    let mut exclude = vec![config.id_column.clone(), config.target_column.clone()];
    exclude.extend(config.exclude.iter().cloned());
    let pipeline = FeaturePipeline::fit(&data.frame, &split.train, &exclude, config.max_categories)?;
    let x_train = pipeline.transform(&data.frame, &split.train)?;
    let x_holdout = pipeline.transform(&data.frame, &split.holdout)?;
    info!(
        train = split.train.len(),
        holdout = split.holdout.len(),
        features = pipeline.width(),
        "design matrix built"
    );

    // 3) λ search by stratified CV.
    let weights = sample_weights(&y_train, config.class_weight);
    let folds = stratified_folds(&y_train, config.folds, config.seed)?;
    let grid = lambda_grid(config.lambda_min, config.lambda_max, config.lambda_steps)?;
    let cv_data = CvData {
        x: &x_train,
        y: &y_train,
        weights: &weights,
        folds: &folds,
        k: config.folds,
    };
    let selection = select_lambda(&cv_data, &grid, config.max_iter, config.tol)?;
    info!(lambda = selection.lambda, candidates = selection.results.len(), "lambda selected");

    // 4) Refit on the whole training portion.
    let opts = IrlsOptions {
        lambda: selection.lambda,
        max_iter: config.max_iter,
        tol: config.tol,
    };
    let fit = fit_logistic(&x_train, &y_train, &weights, &opts)?;
    if !fit.converged {
        warn!(
            iterations = fit.iterations,
            "IRLS did not converge; using the last iterate"
        );
    }
    let model = LogisticModel::from_beta(&fit.beta, &pipeline.names())
        .ok_or_else(|| AppError::new(4, "Coefficient count does not match the feature pipeline."))?;

    // 5) Threshold + holdout metrics.
    let p_holdout = fit.predict(&x_holdout);
    let threshold = match config.threshold_mode {
        ThresholdMode::Fixed => config.threshold,
        ThresholdMode::Youden => youden_threshold(&y_holdout, &p_holdout).unwrap_or_else(|| {
            warn!("holdout has a single class; keeping the fixed threshold");
            config.threshold
        }),
    };
    let metrics = evaluate(&y_holdout, &p_holdout, threshold)?;
    let roc = roc_curve(&y_holdout, &p_holdout);

    let artifact = ModelArtifact {
        tool: "crs".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        created_at: Utc::now(),
        id_column: config.id_column.clone(),
        target_column: config.target_column.clone(),
        pipeline,
        model,
        lambda: selection.lambda,
        threshold,
        metrics,
        cv: selection.results.clone(),
    };

    let scorer = Scorer::from_artifact(artifact.clone())?;
    let holdout = scorer.score_frame(&data.frame.select_rows(&split.holdout))?;

    Ok(TrainRun {
        data,
        split,
        selection,
        artifact,
        holdout,
        roc,
        iterations: fit.iterations,
        converged: fit.converged,
    })
}

fn validate_config(config: &TrainConfig) -> Result<(), AppError> {
    if !(config.threshold.is_finite() && (0.0..=1.0).contains(&config.threshold)) {
        return Err(AppError::new(
            2,
            format!("Invalid threshold {} (must be in [0, 1]).", config.threshold),
        ));
    }
    if config.max_iter == 0 {
        return Err(AppError::new(2, "max_iter must be >= 1."));
    }
    if !(config.tol.is_finite() && config.tol > 0.0) {
        return Err(AppError::new(2, "Invalid convergence tolerance."));
    }
    if config.max_categories == 0 {
        return Err(AppError::new(2, "max_categories must be >= 1."));
    }
    Ok(())
}

fn check_guardrails(data: &TrainingData, config: &TrainConfig) -> Result<(), AppError> {
    let n = data.rows_used();
    if n < MIN_TRAIN_ROWS {
        return Err(AppError::new(
            3,
            format!("Insufficient data: {n} usable rows (need at least {MIN_TRAIN_ROWS})."),
        ));
    }
    let positives = data.stats.positives;
    if positives == 0 || positives == n {
        return Err(AppError::new(
            3,
            "Insufficient data: the target has a single class.",
        ));
    }
    let minority = positives.min(n - positives);
    // Each class must still fill every CV fold after the holdout is removed.
    let holdout_minority = ((minority as f64) * config.test_fraction).round().max(1.0) as usize;
    if minority.saturating_sub(holdout_minority) < config.folds {
        return Err(AppError::new(
            3,
            format!(
                "Insufficient data: minority class has {minority} rows; \
                 need at least {} training rows for {}-fold CV.",
                config.folds, config.folds
            ),
        ));
    }
    Ok(())
}

/// Scored applicants plus metrics for a labelled table.
#[derive(Debug, Clone)]
pub struct EvalRun {
    pub artifact: ModelArtifact,
    pub scored: Vec<ScoredApplicant>,
    pub metrics: EvalMetrics,
    pub roc: Vec<RocPoint>,
}

/// Load a model artifact and build a scorer.
pub fn load_scorer(model_path: &Path) -> Result<Scorer, AppError> {
    let artifact = read_model_json(model_path)?;
    Scorer::from_artifact(artifact)
}

/// Score every row of a CSV file with a saved model.
pub fn run_score(model_path: &Path, input: &Path) -> Result<(Scorer, Vec<ScoredApplicant>), AppError> {
    let scorer = load_scorer(model_path)?;
    let frame = Frame::read_csv(input)?;
    let scored = scorer.score_frame(&frame)?;
    info!(rows = scored.len(), "scored applicants");
    Ok((scorer, scored))
}

/// Evaluate a saved model on a labelled CSV at the model's own threshold.
pub fn run_evaluate(model_path: &Path, input: &Path) -> Result<EvalRun, AppError> {
    let (scorer, scored) = run_score(model_path, input)?;
    let labelled: Vec<&ScoredApplicant> = scored.iter().filter(|s| s.label.is_some()).collect();
    if labelled.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No labelled rows: column `{}` is missing or has no 0/1 values.",
                scorer.artifact().target_column
            ),
        ));
    }
    let y: Vec<f64> = labelled.iter().filter_map(|s| s.label).collect();
    let p: Vec<f64> = labelled.iter().map(|s| s.score.probability).collect();

    let metrics = evaluate(&y, &p, scorer.threshold())?;
    let roc = roc_curve(&y, &p);
    Ok(EvalRun {
        artifact: scorer.artifact().clone(),
        scored,
        metrics,
        roc,
    })
}
