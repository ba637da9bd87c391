//! End-to-end: synthetic raw data -> prepare -> train -> save/load -> score.

use credit_risk::app::pipeline::{run_evaluate, run_score, run_train};
use credit_risk::data::{SampleConfig, write_sample};
use credit_risk::domain::{ClassWeight, FieldValue, ThresholdMode, TrainConfig};
use credit_risk::io::{Frame, read_model_json, write_model_json, write_scores_csv};
use credit_risk::prep::{TEST_FILE, TRAIN_FILE, run_prepare};

#[test]
fn sample_prepare_train_score() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    let processed = dir.path().join("processed");

    let sample = write_sample(
        &raw,
        &SampleConfig {
            applicants: 1500,
            seed: 11,
            test_fraction: 0.2,
        },
    )
    .unwrap();
    assert_eq!(sample.train_rows + sample.test_rows, 1500);

    let prepared = run_prepare(&raw, &processed).unwrap();
    assert_eq!(prepared.train_rows, sample.train_rows);
    assert_eq!(prepared.test_rows, sample.test_rows);

    let config = TrainConfig {
        input: prepared.train_path.clone(),
        model_out: dir.path().join("models/model.json"),
        folds: 3,
        lambda_steps: 4,
        class_weight: ClassWeight::Balanced,
        threshold_mode: ThresholdMode::Youden,
        ..TrainConfig::default()
    };
    let run = run_train(&config).unwrap();

    assert_eq!(run.data.rows_used(), sample.train_rows);
    assert_eq!(run.selection.results.len(), 4);
    assert_eq!(run.holdout.len(), run.split.holdout.len());
    assert!(run.holdout.iter().all(|s| s.label.is_some()));

    let metrics = &run.artifact.metrics;
    let auc = metrics.auc.unwrap();
    assert!(auc > 0.5 && auc <= 1.0, "auc={auc}");
    assert!((metrics.gini.unwrap() - (2.0 * auc - 1.0)).abs() < 1e-12);
    assert!((0.0..=1.0).contains(&run.artifact.threshold));

    // Artifact survives a JSON round trip and scores the same way.
    write_model_json(&config.model_out, &run.artifact).unwrap();
    let loaded = read_model_json(&config.model_out).unwrap();
    assert_eq!(loaded.pipeline.names(), run.artifact.pipeline.names());
    assert_eq!(loaded.model.coefficients.len(), run.artifact.model.coefficients.len());

    let (scorer, scored) = run_score(&config.model_out, &prepared.test_path).unwrap();
    assert_eq!(scored.len(), sample.test_rows);
    assert!(scored.iter().all(|s| s.label.is_none()));
    assert!(
        scored
            .iter()
            .all(|s| (0.0..=1.0).contains(&s.score.probability) && s.score.top_factors.len() <= 5)
    );
    assert_eq!(scorer.threshold(), run.artifact.threshold);

    let out = dir.path().join("scores.csv");
    write_scores_csv(&out, &scored).unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("id,probability,decision,grade\n"));
    assert_eq!(text.lines().count(), sample.test_rows + 1);

    // The labelled training file can be evaluated; the unlabelled test file cannot.
    let eval = run_evaluate(&config.model_out, &prepared.train_path).unwrap();
    assert_eq!(eval.metrics.n, sample.train_rows);
    let err = run_evaluate(&config.model_out, &prepared.test_path).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn training_on_a_tiny_file_reports_insufficient_data() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tiny.csv");
    std::fs::write(&input, "SK_ID_CURR,TARGET,X\n1,0,1.0\n2,1,2.0\n3,0,3.0\n").unwrap();

    let config = TrainConfig {
        input,
        ..TrainConfig::default()
    };
    let err = run_train(&config).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn prepared_test_file_uses_training_codes_and_scores() {
    let binary = ["NAME_CONTRACT_TYPE", "CODE_GENDER", "FLAG_OWN_CAR", "FLAG_OWN_REALTY"];

    // A tiny test split often shows one value (or the other value first).
    for seed in 1..=6 {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        let processed = dir.path().join("processed");
        write_sample(
            &raw,
            &SampleConfig {
                applicants: 400,
                seed,
                test_fraction: 0.02,
            },
        )
        .unwrap();
        let prepared = run_prepare(&raw, &processed).unwrap();

        let raw_train = Frame::read_csv(&raw.join(TRAIN_FILE)).unwrap();
        let raw_test = Frame::read_csv(&raw.join(TEST_FILE)).unwrap();
        let clean_test = Frame::read_csv(&prepared.test_path).unwrap();
        for name in binary {
            let train_col = raw_train.column(name).unwrap();
            let mut order: Vec<String> = Vec::new();
            for row in 0..raw_train.n_rows() {
                if let Some(level) = train_col.label(row) {
                    if !order.contains(&level) {
                        order.push(level);
                    }
                }
            }
            assert_eq!(order.len(), 2, "seed {seed} {name}");

            let raw_col = raw_test.column(name).unwrap();
            let clean_col = clean_test.column(name).unwrap();
            assert!(clean_col.is_numeric(), "seed {seed} {name}");
            for row in 0..raw_test.n_rows() {
                let code = raw_col
                    .label(row)
                    .and_then(|l| order.iter().position(|o| *o == l))
                    .map_or(-1.0, |i| i as f64);
                assert_eq!(clean_col.value(row), FieldValue::Number(code), "seed {seed} {name} row {row}");
            }
        }

        let config = TrainConfig {
            input: prepared.train_path.clone(),
            model_out: dir.path().join("model.json"),
            folds: 3,
            lambda_steps: 2,
            ..TrainConfig::default()
        };
        let run = run_train(&config).unwrap();
        write_model_json(&config.model_out, &run.artifact).unwrap();
        let (_, scored) = run_score(&config.model_out, &prepared.test_path).unwrap();
        assert_eq!(scored.len(), prepared.test_rows, "seed {seed}");
    }
}
