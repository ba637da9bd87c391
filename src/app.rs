//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs data preparation, training, evaluation and scoring
//! - prints reports/plots and writes exports
//! - starts the HTTP server or the dashboard

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{
    Cli, Command, DashboardArgs, EvaluateArgs, LogFormat, PrepareArgs, SampleArgs, ScoreArgs,
    ServeArgs, TrainArgs,
};
use crate::domain::TrainConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `crs` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Command::Sample(args) => handle_sample(args),
        Command::Prepare(args) => handle_prepare(args),
        Command::Train(args) => handle_train(args),
        Command::Evaluate(args) => handle_evaluate(args),
        Command::Score(args) => handle_score(args),
        Command::Serve(args) => handle_serve(args),
        Command::Dashboard(args) => handle_dashboard(args),
    }
}

/// Logs go to stderr so reports on stdout stay pipeable.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A second init (e.g. in tests) is harmless.
    let _ = match format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = crate::data::SampleConfig {
        applicants: args.applicants,
        seed: args.seed,
        test_fraction: args.test_fraction,
    };
    let summary = crate::data::write_sample(&args.out, &config)?;
    println!(
        "Wrote sample to {}: train={} test={} bureau={} bureau_balance={} previous={} installments={} | default rate={:.2}%",
        args.out.display(),
        summary.train_rows,
        summary.test_rows,
        summary.bureau_rows,
        summary.bureau_balance_rows,
        summary.previous_rows,
        summary.installment_rows,
        100.0 * summary.default_rate(),
    );
    Ok(())
}

fn handle_prepare(args: PrepareArgs) -> Result<(), AppError> {
    let summary = crate::prep::run_prepare(&args.raw, &args.out)?;
    println!(
        "Prepared {} ({} rows) and {} ({} rows), {} columns.",
        summary.train_path.display(),
        summary.train_rows,
        summary.test_path.display(),
        summary.test_rows,
        summary.columns,
    );
    Ok(())
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(&args);
    let run = pipeline::run_train(&config)?;

    println!("{}", crate::report::format_train_report(&run, &config));

    if config.plot {
        let metrics = &run.artifact.metrics;
        let plot = crate::plot::render_roc_plot(
            &run.roc,
            metrics.auc,
            Some(metrics.confusion.operating_point()),
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    crate::io::write_model_json(&config.model_out, &run.artifact)?;
    info!(path = %config.model_out.display(), "model saved");
    println!("Model written to {}", config.model_out.display());

    if let Some(path) = &config.export_holdout {
        crate::io::write_scores_csv(path, &run.holdout)?;
        println!("Holdout scores written to {}", path.display());
    }
    Ok(())
}

fn handle_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let run = pipeline::run_evaluate(&args.model, &args.input)?;
    println!("{}", crate::report::format_eval_report(&run));
    if args.plot {
        let plot = crate::plot::render_roc_plot(
            &run.roc,
            run.metrics.auc,
            Some(run.metrics.confusion.operating_point()),
            args.width,
            args.height,
        );
        println!("{plot}");
    }
    Ok(())
}

fn handle_score(args: ScoreArgs) -> Result<(), AppError> {
    let (scorer, scored) = pipeline::run_score(&args.model, &args.input)?;
    let summary = crate::report::summarize(scored.iter().map(|s| &s.score), scorer.threshold());
    println!("{}", crate::report::format_score_report(&scored, &summary, args.top));

    if let Some(path) = &args.out {
        crate::io::write_scores_csv(path, &scored)?;
        println!("Scores written to {}", path.display());
    }
    Ok(())
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    crate::server::run(crate::server::ServerSettings {
        host: args.host,
        port: args.port,
        workers: args.workers,
        model: args.model,
        max_batch: args.max_batch,
    })
}

fn handle_dashboard(args: DashboardArgs) -> Result<(), AppError> {
    let source = match args.remote {
        Some(url) => crate::tui::DashboardSource::Remote {
            url,
            input: args.input,
            chunk: args.chunk,
        },
        None => crate::tui::DashboardSource::Local {
            model: args.model,
            input: args.input,
        },
    };
    crate::tui::run(source)
}

pub fn train_config_from_args(args: &TrainArgs) -> TrainConfig {
    TrainConfig {
        input: args.input.clone(),
        model_out: args.model_out.clone(),
        id_column: args.id_column.clone(),
        target_column: args.target.clone(),
        exclude: args.exclude.clone(),
        max_categories: args.max_categories,
        test_fraction: args.test_fraction,
        seed: args.seed,
        folds: args.folds,
        lambda_min: args.lambda_min,
        lambda_max: args.lambda_max,
        lambda_steps: args.lambda_steps,
        max_iter: args.max_iter,
        tol: args.tol,
        class_weight: args.class_weight,
        threshold_mode: args.threshold_mode,
        threshold: args.threshold,
        top_n: args.top,
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
        export_holdout: args.export_holdout.clone(),
    }
}
