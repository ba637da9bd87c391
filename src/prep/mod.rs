//! Data preparation: raw applicant files -> one clean modelling table.
//!
//! Steps:
//! 1. load `application_{train,test}.csv`
//! 2. aggregate bureau, previous-application and installment history per applicant
//! 3. left-join the aggregates on `SK_ID_CURR`
//! 4. final cleaning (median imputation, binary label encoding)
//!
//! No modelling logic lives here; the output is written as CSV and consumed by
//! the trainer.

use std::collections::{BTreeMap, HashMap};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::AppError;
use crate::io::table::{Column, Frame};

pub mod agg;
pub mod bureau;
pub mod installments;
pub mod previous;

pub use bureau::aggregate_bureau;
pub use installments::aggregate_installments;
pub use previous::aggregate_previous;

/// Applicant id shared by every raw file.
pub const KEY_APPLICANT: &str = "SK_ID_CURR";
/// External credit id linking `bureau.csv` and `bureau_balance.csv`.
pub const KEY_BUREAU: &str = "SK_ID_BUREAU";

pub const TRAIN_FILE: &str = "application_train.csv";
pub const TEST_FILE: &str = "application_test.csv";
pub const TRAIN_OUT: &str = "train_clean.csv";
pub const TEST_OUT: &str = "test_clean.csv";

/// Paths and sizes written by [`run_prepare`].
#[derive(Debug, Clone)]
pub struct PrepareSummary {
    pub train_path: PathBuf,
    pub train_rows: usize,
    pub test_path: PathBuf,
    pub test_rows: usize,
    pub columns: usize,
}

/// Load the main application table.
pub fn load_application_data(dir: &Path, is_train: bool) -> Result<Frame, AppError> {
    let name = if is_train { TRAIN_FILE } else { TEST_FILE };
    let path = dir.join(name);
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!(
                "Could not find {}. Please check the file location.",
                path.display()
            ),
        ));
    }
    Frame::read_csv(&path)
}

/// Left-join `right` onto `left` by an integer key column.
///
/// Every non-key column of `right` is appended; rows of `left` without a match
/// get missing values. Duplicate keys in `right` resolve to the first row.
pub fn merge_left(left: &mut Frame, right: &Frame, key: &str) -> Result<(), AppError> {
    let left_keys = left.keys(key, "left table")?;
    let right_keys = right.keys(key, "right table")?;

    let mut lookup: HashMap<i64, usize> = HashMap::with_capacity(right_keys.len());
    for (row, k) in right_keys.iter().enumerate() {
        if let Some(k) = k {
            lookup.entry(*k).or_insert(row);
        }
    }
    let rows: Vec<Option<usize>> = left_keys
        .iter()
        .map(|k| k.and_then(|k| lookup.get(&k).copied()))
        .collect();

    let appended: Vec<(String, Column)> = right
        .columns()
        .filter(|(name, _)| *name != key)
        .map(|(name, col)| {
            let col = match col {
                Column::Numeric(v) => {
                    Column::Numeric(rows.iter().map(|r| r.and_then(|r| v[r])).collect())
                }
                Column::Text(v) => {
                    Column::Text(rows.iter().map(|r| r.and_then(|r| v[r].clone())).collect())
                }
            };
            (name.to_string(), col)
        })
        .collect();

    for (name, col) in appended {
        left.push_column(name, col)?;
    }
    Ok(())
}

/// Merge each feature table onto the application table, in order.
pub fn merge_all_features(mut app: Frame, tables: &[Frame]) -> Result<Frame, AppError> {
    for table in tables {
        merge_left(&mut app, table, KEY_APPLICANT)?;
    }
    Ok(app)
}

/// Level order of every label-encoded binary column.
///
/// Learned on the training split and reused for the test split, so a value
/// gets the same code in both files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryLevels {
    columns: BTreeMap<String, [String; 2]>,
}

impl BinaryLevels {
    /// Text columns with exactly two distinct values, in order of first appearance.
    pub fn learn(frame: &Frame) -> Self {
        let columns = frame
            .columns()
            .filter_map(|(name, col)| match col {
                Column::Text(values) => binary_levels(values).map(|l| (name.to_string(), l)),
                Column::Numeric(_) => None,
            })
            .collect();
        Self { columns }
    }

    /// `[level coded 0, level coded 1]` for `column`.
    pub fn get(&self, column: &str) -> Option<&[String; 2]> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

fn binary_levels(values: &[Option<String>]) -> Option<[String; 2]> {
    let mut levels: Vec<&str> = Vec::with_capacity(2);
    for v in values.iter().flatten() {
        if !levels.contains(&v.as_str()) {
            if levels.len() == 2 {
                return None;
            }
            levels.push(v.as_str());
        }
    }
    match levels.as_slice() {
        [a, b] => Some([a.to_string(), b.to_string()]),
        _ => None,
    }
}

/// Final cleaning of the merged table.
///
/// - numeric columns: missing values -> column median (all-missing columns stay missing)
/// - binary text columns: `0` for the first level, `1` for the second,
///   `-1` for missing or unknown values
/// - other text columns are left untouched
///
/// With `learned = None` the binary columns and their level order come from
/// `frame` itself (training split); otherwise `learned` is applied as is. The
/// levels used are returned.
pub fn preprocess_final(
    frame: &mut Frame,
    learned: Option<&BinaryLevels>,
) -> Result<BinaryLevels, AppError> {
    let levels = match learned {
        Some(levels) => levels.clone(),
        None => BinaryLevels::learn(frame),
    };

    let names: Vec<String> = frame.names().to_vec();
    for name in names {
        let Some(col) = frame.column(&name) else { continue };
        let replacement = match (col, levels.get(&name)) {
            (Column::Text(values), Some(pair)) => {
                debug!(column = %name, zero = %pair[0], one = %pair[1], "label-encoded binary column");
                let code = |v: &Option<String>| {
                    let matches = v.as_deref().map(|s| [s == pair[0], s == pair[1]]);
                    Some(binary_code(matches))
                };
                Column::Numeric(values.iter().map(code).collect())
            }
            // Binary in training but read as numbers here (numeric-looking or all missing).
            (Column::Numeric(values), Some(pair)) => {
                let parsed = [&pair[0], &pair[1]].map(|l| l.trim().parse::<f64>().ok());
                let code = |v: &Option<f64>| {
                    let matches = v.map(|x| parsed.map(|l| l == Some(x)));
                    Some(binary_code(matches))
                };
                Column::Numeric(values.iter().map(code).collect())
            }
            (Column::Text(_), None) => continue,
            (Column::Numeric(values), None) => {
                if values.iter().all(Option::is_some) {
                    continue;
                }
                let Some(fill) = agg::median(values) else { continue };
                Column::Numeric(values.iter().map(|v| Some(v.unwrap_or(fill))).collect())
            }
        };
        frame.replace_column(&name, replacement)?;
    }
    Ok(levels)
}

/// `0`/`1` for the matching level, `-1` for missing or unknown values.
fn binary_code(matches: Option<[bool; 2]>) -> f64 {
    match matches {
        Some([true, _]) => 0.0,
        Some([_, true]) => 1.0,
        _ => -1.0,
    }
}

/// Full preparation for one split (train or test).
///
/// Pass the training split's [`BinaryLevels`] when preparing the test split.
pub fn prepare_dataset(
    dir: &Path,
    is_train: bool,
    learned: Option<&BinaryLevels>,
) -> Result<(Frame, BinaryLevels), AppError> {
    let app = load_application_data(dir, is_train)?;
    info!(
        rows = app.n_rows(),
        cols = app.n_cols(),
        split = if is_train { "train" } else { "test" },
        "loaded application data"
    );

    let bureau = aggregate_bureau(dir)?;
    let previous = aggregate_previous(dir)?;
    let installments = aggregate_installments(dir)?;
    debug!(
        bureau = bureau.n_rows(),
        previous = previous.n_rows(),
        installments = installments.n_rows(),
        "aggregated history tables"
    );

    let mut full = merge_all_features(app, &[bureau, previous, installments])?;
    let levels = preprocess_final(&mut full, learned)?;
    Ok((full, levels))
}

/// Prepare train and test tables and write them to `out_dir`.
pub fn run_prepare(raw_dir: &Path, out_dir: &Path) -> Result<PrepareSummary, AppError> {
    create_dir_all(out_dir).map_err(|e| {
        AppError::new(2, format!("Failed to create output dir '{}': {e}", out_dir.display()))
    })?;

    info!("preparing training data");
    let (train, levels) = prepare_dataset(raw_dir, true, None)?;
    debug!(columns = ?levels.columns().collect::<Vec<_>>(), "binary columns");
    let train_path = out_dir.join(TRAIN_OUT);
    train.write_csv(&train_path)?;

    info!("preparing test data");
    let (test, _) = prepare_dataset(raw_dir, false, Some(&levels))?;
    let test_path = out_dir.join(TEST_OUT);
    test.write_csv(&test_path)?;

    info!(train = %train_path.display(), test = %test_path.display(), "data preparation completed");
    Ok(PrepareSummary {
        train_path,
        train_rows: train.n_rows(),
        test_path,
        test_rows: test.n_rows(),
        columns: train.n_cols(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(csv: &str) -> Frame {
        Frame::from_reader(csv.as_bytes(), "test").unwrap()
    }

    #[test]
    fn merge_left_keeps_unmatched_rows() {
        let mut app = frame("SK_ID_CURR,X\n1,a\n2,b\n3,c\n");
        let agg = frame("SK_ID_CURR,F\n3,30\n1,10\n");
        merge_left(&mut app, &agg, KEY_APPLICANT).unwrap();

        assert_eq!(
            app.column("F"),
            Some(&Column::Numeric(vec![Some(10.0), None, Some(30.0)]))
        );
    }

    #[test]
    fn preprocess_final_imputes_and_encodes() {
        let mut f = frame(
            "SK_ID_CURR,AMT,FLAG,KIND,EMPTY\n\
             1,1,Y,a,\n\
             2,,N,b,\n\
             3,3,,c,\n\
             4,10,Y,a,\n",
        );
        let levels = preprocess_final(&mut f, None).unwrap();
        assert_eq!(levels.columns().collect::<Vec<_>>(), vec!["FLAG"]);

        assert_eq!(
            f.column("AMT"),
            Some(&Column::Numeric(vec![Some(1.0), Some(3.0), Some(3.0), Some(10.0)]))
        );
        assert_eq!(
            f.column("FLAG"),
            Some(&Column::Numeric(vec![Some(0.0), Some(1.0), Some(-1.0), Some(0.0)]))
        );
        // Three levels: left as text.
        assert!(!f.column("KIND").unwrap().is_numeric());
        // All missing: nothing to impute with.
        assert_eq!(f.column("EMPTY"), Some(&Column::Numeric(vec![None; 4])));
    }

    #[test]
    fn test_split_reuses_training_levels() {
        let mut train = frame("SK_ID_CURR,GENDER,KIND\n1,F,a\n2,M,b\n3,F,c\n");
        let levels = preprocess_final(&mut train, None).unwrap();
        assert_eq!(levels.get("GENDER").unwrap(), &["F".to_string(), "M".to_string()]);

        // Opposite first appearance, plus an unseen value.
        let mut test = frame("SK_ID_CURR,GENDER,KIND\n4,M,a\n5,F,b\n6,X,b\n7,,a\n");
        preprocess_final(&mut test, Some(&levels)).unwrap();
        assert_eq!(
            test.column("GENDER"),
            Some(&Column::Numeric(vec![Some(1.0), Some(0.0), Some(-1.0), Some(-1.0)]))
        );
        // Two values here but three in training: still categorical text.
        assert!(!test.column("KIND").unwrap().is_numeric());

        // A single observed value is still encoded.
        let mut single = frame("SK_ID_CURR,GENDER,KIND\n8,M,a\n9,M,a\n");
        preprocess_final(&mut single, Some(&levels)).unwrap();
        assert_eq!(single.column("GENDER"), Some(&Column::Numeric(vec![Some(1.0); 2])));
    }

    #[test]
    fn numeric_looking_binary_levels_match_by_value() {
        let mut train = frame("SK_ID_CURR,FLAG\n1,Y\n2,1\n");
        let levels = preprocess_final(&mut train, None).unwrap();

        let mut test = frame("SK_ID_CURR,FLAG\n3,1\n4,\n5,7\n");
        assert!(test.column("FLAG").unwrap().is_numeric());
        preprocess_final(&mut test, Some(&levels)).unwrap();
        assert_eq!(
            test.column("FLAG"),
            Some(&Column::Numeric(vec![Some(1.0), Some(-1.0), Some(-1.0)]))
        );
    }

    #[test]
    fn missing_application_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_application_data(dir.path(), true).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains(TRAIN_FILE));
    }
}
