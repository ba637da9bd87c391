//! Feature pipeline: raw applicant attributes -> model design row.
//!
//! The pipeline is fitted on the training rows only and stored inside the
//! model artifact, so scoring reproduces exactly the transformation the
//! coefficients were estimated on:
//!
//! - numeric: impute the training median, then standardize with the training
//!   mean and standard deviation (constant columns are dropped)
//! - categorical: one-hot over the most frequent training levels; unseen or
//!   missing values encode as all zeros

use std::collections::HashMap;
use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ApplicantRecord, FieldValue};
use crate::error::AppError;
use crate::io::table::{Column, Frame};
use crate::prep::agg::median;

/// Standard deviations below this are treated as a constant column.
const MIN_STD: f64 = 1e-12;

/// One input attribute and how it is encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeatureSpec {
    Numeric {
        name: String,
        median: f64,
        mean: f64,
        std: f64,
    },
    Categorical {
        name: String,
        levels: Vec<String>,
    },
}

impl FeatureSpec {
    pub fn name(&self) -> &str {
        match self {
            FeatureSpec::Numeric { name, .. } | FeatureSpec::Categorical { name, .. } => name,
        }
    }

    /// Number of design columns this feature expands to.
    pub fn width(&self) -> usize {
        match self {
            FeatureSpec::Numeric { .. } => 1,
            FeatureSpec::Categorical { levels, .. } => levels.len(),
        }
    }

    /// Encode one raw value into `out` (length `self.width()`).
    pub fn encode(&self, value: Option<&FieldValue>, out: &mut [f64]) -> Result<(), InvalidFeature> {
        match self {
            FeatureSpec::Numeric {
                name,
                median,
                mean,
                std,
            } => {
                let raw = numeric_value(name, value)?.unwrap_or(*median);
                out[0] = (raw - mean) / std;
            }
            FeatureSpec::Categorical { levels, .. } => {
                out.fill(0.0);
                if let Some(label) = value.and_then(FieldValue::to_label) {
                    if let Some(idx) = levels.iter().position(|l| same_level(l, &label)) {
                        out[idx] = 1.0;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Levels match on text, or on value when both sides read as numbers
/// (`"1.0"` and `1`).
fn same_level(level: &str, label: &str) -> bool {
    if level == label {
        return true;
    }
    match (level.trim().parse::<f64>(), label.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.is_finite() && a == b,
        _ => false,
    }
}

/// A raw value that cannot be encoded for the named field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFeature {
    pub field: String,
    pub message: String,
}

impl fmt::Display for InvalidFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid value for `{}`: {}", self.field, self.message)
    }
}

impl std::error::Error for InvalidFeature {}

impl From<InvalidFeature> for AppError {
    fn from(err: InvalidFeature) -> Self {
        AppError::new(2, err.to_string())
    }
}

fn numeric_value(name: &str, value: Option<&FieldValue>) -> Result<Option<f64>, InvalidFeature> {
    let Some(value) = value else { return Ok(None) };
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Number(v) if v.is_finite() => Ok(Some(*v)),
        FieldValue::Number(_) => Ok(None),
        FieldValue::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        FieldValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            match s.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(InvalidFeature {
                    field: name.to_string(),
                    message: format!("expected a number, got \"{s}\""),
                }),
            }
        }
    }
}

/// Ordered list of fitted feature encoders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    pub features: Vec<FeatureSpec>,
}

impl FeaturePipeline {
    /// Fit encoders on `rows` of `frame`, skipping `exclude`d columns.
    pub fn fit(
        frame: &Frame,
        rows: &[usize],
        exclude: &[String],
        max_categories: usize,
    ) -> Result<Self, AppError> {
        if rows.is_empty() {
            return Err(AppError::new(3, "No rows available to fit the feature pipeline."));
        }

        let mut features = Vec::new();
        for (name, column) in frame.columns() {
            if exclude.iter().any(|e| e == name) {
                continue;
            }
            let spec = match column {
                Column::Numeric(values) => fit_numeric(name, values, rows),
                Column::Text(values) => fit_categorical(name, values, rows, max_categories),
            };
            match spec {
                Some(spec) => features.push(spec),
                None => debug!(column = %name, "dropped constant or empty feature"),
            }
        }

        if features.is_empty() {
            return Err(AppError::new(3, "No usable feature columns after preprocessing."));
        }
        Ok(Self { features })
    }

    /// Total number of design columns (excluding the intercept).
    pub fn width(&self) -> usize {
        self.features.iter().map(FeatureSpec::width).sum()
    }

    /// Design column names, `feature` for numeric and `feature=level` for one-hot.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.width());
        for spec in &self.features {
            match spec {
                FeatureSpec::Numeric { name, .. } => out.push(name.clone()),
                FeatureSpec::Categorical { name, levels } => {
                    out.extend(levels.iter().map(|l| format!("{name}={l}")));
                }
            }
        }
        out
    }

    /// Encode values looked up by feature name.
    pub fn encode_with<'a, F>(&self, lookup: F) -> Result<Vec<f64>, InvalidFeature>
    where
        F: Fn(&str) -> Option<&'a FieldValue>,
    {
        let mut out = vec![0.0; self.width()];
        let mut offset = 0;
        for spec in &self.features {
            let w = spec.width();
            spec.encode(lookup(spec.name()), &mut out[offset..offset + w])?;
            offset += w;
        }
        Ok(out)
    }

    pub fn encode_record(&self, record: &ApplicantRecord) -> Result<Vec<f64>, InvalidFeature> {
        self.encode_with(|name| record.features.get(name))
    }

    /// Design matrix (`rows.len()` × `width()`) for the given frame rows.
    pub fn transform(&self, frame: &Frame, rows: &[usize]) -> Result<DMatrix<f64>, AppError> {
        let columns: HashMap<&str, &Column> = frame.columns().collect();
        let p = self.width();
        let mut data = Vec::with_capacity(rows.len() * p);
        for &row in rows {
            let values: HashMap<&str, FieldValue> = self
                .features
                .iter()
                .filter_map(|spec| {
                    columns
                        .get(spec.name())
                        .map(|col| (spec.name(), col.value(row)))
                })
                .collect();
            let encoded = self
                .encode_with(|name| values.get(name))
                .map_err(|e| AppError::from(e).context(format!("line {}", row + 2)))?;
            data.extend(encoded);
        }
        Ok(DMatrix::from_row_slice(rows.len(), p, &data))
    }
}

fn fit_numeric(name: &str, values: &[Option<f64>], rows: &[usize]) -> Option<FeatureSpec> {
    let observed: Vec<Option<f64>> = rows.iter().map(|&r| values[r]).collect();
    let median = median(&observed)?;
    let imputed: Vec<f64> = observed.iter().map(|v| v.unwrap_or(median)).collect();

    let n = imputed.len() as f64;
    let mean = imputed.iter().sum::<f64>() / n;
    let var = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if !(std.is_finite() && std > MIN_STD) {
        return None;
    }

    Some(FeatureSpec::Numeric {
        name: name.to_string(),
        median,
        mean,
        std,
    })
}

fn fit_categorical(
    name: &str,
    values: &[Option<String>],
    rows: &[usize],
    max_categories: usize,
) -> Option<FeatureSpec> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &r in rows {
        if let Some(v) = values[r].as_deref() {
            *counts.entry(v).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(max_categories);

    // A single level present on every row carries no information.
    if ranked.is_empty() || (ranked.len() == 1 && ranked[0].1 == rows.len()) {
        return None;
    }

    Some(FeatureSpec::Categorical {
        name: name.to_string(),
        levels: ranked.into_iter().map(|(l, _)| l.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_reader(
            "SK_ID_CURR,TARGET,AMT,CONST,KIND\n\
             1,0,10,5,b\n\
             2,1,,5,a\n\
             3,0,30,5,b\n\
             4,1,40,5,c\n"
                .as_bytes(),
            "test",
        )
        .unwrap()
    }

    fn excluded() -> Vec<String> {
        vec!["SK_ID_CURR".to_string(), "TARGET".to_string()]
    }

    #[test]
    fn fit_drops_constant_and_orders_levels() {
        let pipeline = FeaturePipeline::fit(&frame(), &[0, 1, 2, 3], &excluded(), 2).unwrap();

        assert_eq!(pipeline.features.len(), 2);
        match &pipeline.features[0] {
            FeatureSpec::Numeric { name, median, .. } => {
                assert_eq!(name, "AMT");
                assert_eq!(*median, 30.0);
            }
            other => panic!("unexpected spec {other:?}"),
        }
        // b is most frequent, then a/c tie broken alphabetically; capped at 2.
        assert_eq!(pipeline.names(), vec!["AMT", "KIND=b", "KIND=a"]);
    }

    #[test]
    fn transform_imputes_and_standardizes() {
        let f = frame();
        let pipeline = FeaturePipeline::fit(&f, &[0, 1, 2, 3], &excluded(), 5).unwrap();
        let x = pipeline.transform(&f, &[0, 1, 2, 3]).unwrap();

        // Standardized column has zero mean.
        let mean: f64 = x.column(0).iter().sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        // Row 1 (missing AMT) is imputed with the median 30, same as row 2.
        assert!((x[(1, 0)] - x[(2, 0)]).abs() < 1e-12);
        // KIND=c for row 3 only.
        assert_eq!(x[(3, 3)], 1.0);
        assert_eq!(x.row(3).iter().skip(1).sum::<f64>(), 1.0);
    }

    #[test]
    fn record_encoding_accepts_numeric_strings_and_unseen_levels() {
        let pipeline = FeaturePipeline::fit(&frame(), &[0, 1, 2, 3], &excluded(), 5).unwrap();

        let mut record = ApplicantRecord::default();
        record
            .features
            .insert("AMT".to_string(), FieldValue::Text("30".to_string()));
        record
            .features
            .insert("KIND".to_string(), FieldValue::Text("zzz".to_string()));
        let row = pipeline.encode_record(&record).unwrap();
        assert_eq!(&row[1..], &[0.0, 0.0, 0.0]);

        record
            .features
            .insert("AMT".to_string(), FieldValue::Text("lots".to_string()));
        let err = pipeline.encode_record(&record).unwrap_err();
        assert_eq!(err.field, "AMT");
    }

    #[test]
    fn numeric_levels_match_by_value() {
        let f = Frame::from_reader(
            "SK_ID_CURR,TARGET,TERM\n1,0,1.0\n2,1,1.0\n3,0,2.5\n4,1,x\n".as_bytes(),
            "test",
        )
        .unwrap();
        let pipeline = FeaturePipeline::fit(&f, &[0, 1, 2, 3], &excluded(), 5).unwrap();
        assert_eq!(pipeline.names(), vec!["TERM=1.0", "TERM=2.5", "TERM=x"]);

        let encode = |value: FieldValue| {
            let mut record = ApplicantRecord::default();
            record.features.insert("TERM".to_string(), value);
            pipeline.encode_record(&record).unwrap()
        };
        assert_eq!(encode(FieldValue::Number(1.0)), vec![1.0, 0.0, 0.0]);
        assert_eq!(encode(FieldValue::Text("1.0".to_string())), vec![1.0, 0.0, 0.0]);
        assert_eq!(encode(FieldValue::Text("1".to_string())), vec![1.0, 0.0, 0.0]);
        assert_eq!(encode(FieldValue::Number(2.5)), vec![0.0, 1.0, 0.0]);
        assert_eq!(encode(FieldValue::Number(3.0)), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn no_usable_columns_is_insufficient_data() {
        let f = Frame::from_reader("SK_ID_CURR,TARGET,C\n1,0,1\n2,1,1\n".as_bytes(), "test").unwrap();
        let err = FeaturePipeline::fit(&f, &[0, 1], &excluded(), 5).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
