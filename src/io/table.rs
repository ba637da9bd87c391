//! Typed in-memory tables read from CSV.
//!
//! A `Frame` is the unit every preparation step works on. Column types are
//! inferred once at load time:
//!
//! - a column is **numeric** when every non-empty cell parses as a finite `f64`
//! - otherwise it is **text** (categorical)
//!
//! Empty cells are missing values in both cases.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::FieldValue;
use crate::error::AppError;

/// A single typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// Cell value as a `FieldValue`.
    pub fn value(&self, row: usize) -> FieldValue {
        match self {
            Column::Numeric(v) => match v.get(row).copied().flatten() {
                Some(x) => FieldValue::Number(x),
                None => FieldValue::Null,
            },
            Column::Text(v) => match v.get(row).cloned().flatten() {
                Some(s) => FieldValue::Text(s),
                None => FieldValue::Null,
            },
        }
    }

    /// Cell rendered as a label (numbers use their shortest round-trip form).
    pub fn label(&self, row: usize) -> Option<String> {
        self.value(row).to_label()
    }

    fn render(&self, row: usize) -> String {
        self.label(row).unwrap_or_default()
    }
}

/// A column-oriented table with unique column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    n_rows: usize,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|idx| &self.columns[idx])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Replace the contents of an existing column (length must match).
    pub fn replace_column(&mut self, name: &str, column: Column) -> Result<(), AppError> {
        let idx = self
            .position(name)
            .ok_or_else(|| AppError::new(4, format!("Unknown column `{name}`.")))?;
        if column.len() != self.n_rows {
            return Err(AppError::new(
                4,
                format!(
                    "Column `{name}` has {} rows, frame has {}.",
                    column.len(),
                    self.n_rows
                ),
            ));
        }
        self.columns[idx] = column;
        Ok(())
    }

    /// Append a column. The first column defines the row count.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), AppError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(AppError::new(2, format!("Duplicate column `{name}`.")));
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        } else if column.len() != self.n_rows {
            return Err(AppError::new(
                4,
                format!(
                    "Column `{name}` has {} rows, frame has {}.",
                    column.len(),
                    self.n_rows
                ),
            ));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// A new frame holding only `rows` (in the given order).
    pub fn select_rows(&self, rows: &[usize]) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|col| match col {
                Column::Numeric(v) => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
                Column::Text(v) => Column::Text(rows.iter().map(|&r| v[r].clone()).collect()),
            })
            .collect();
        Frame {
            names: self.names.clone(),
            columns,
            index: self.index.clone(),
            n_rows: rows.len(),
        }
    }

    /// Numeric column values, or an input error naming the file/column.
    pub fn require_numeric(&self, name: &str, source: &str) -> Result<&[Option<f64>], AppError> {
        match self.column(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Text(_)) => Err(AppError::new(
                2,
                format!("Column `{name}` in {source} must be numeric."),
            )),
            None => Err(AppError::new(
                2,
                format!("Missing required column in {source}: `{name}`"),
            )),
        }
    }

    /// Integer join keys for a numeric id column (`None` for missing/non-integral cells).
    pub fn keys(&self, name: &str, source: &str) -> Result<Vec<Option<i64>>, AppError> {
        Ok(self
            .require_numeric(name, source)?
            .iter()
            .map(|v| v.and_then(as_key))
            .collect())
    }

    /// Load a CSV file, inferring column types.
    pub fn read_csv(path: &Path) -> Result<Frame, AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display()))
        })?;
        Self::from_reader(file, &path.display().to_string())
    }

    /// Load CSV data from any reader. `source` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Frame, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::new(2, format!("Failed to read CSV headers of {source}: {e}")))?
            .iter()
            .map(normalize_header_name)
            .collect();

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for (idx, result) in reader.records().enumerate() {
            // +2: records() starts after the header and CSV lines are 1-based.
            let line = idx + 2;
            let record = result
                .map_err(|e| AppError::new(2, format!("CSV parse error in {source} line {line}: {e}")))?;
            for (col, cells) in raw.iter_mut().enumerate() {
                let cell = record.get(col).map(str::trim).filter(|s| !s.is_empty());
                cells.push(cell.map(str::to_string));
            }
        }

        let mut frame = Frame::new();
        for (name, cells) in headers.into_iter().zip(raw) {
            frame.push_column(name, infer_column(cells))?;
        }
        Ok(frame)
    }

    /// Write the frame as CSV (missing values become empty cells).
    pub fn write_csv(&self, path: &Path) -> Result<(), AppError> {
        let file = File::create(path).map_err(|e| {
            AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display()))
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(&self.names)
            .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;

        let mut row_buf: Vec<String> = Vec::with_capacity(self.n_cols());
        for row in 0..self.n_rows {
            row_buf.clear();
            row_buf.extend(self.columns.iter().map(|c| c.render(row)));
            writer
                .write_record(&row_buf)
                .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to flush CSV '{}': {e}", path.display())))?;
        Ok(())
    }
}

/// Convert a numeric id cell into an integer join key.
pub fn as_key(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        Some(v as i64)
    } else {
        None
    }
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn infer_column(cells: Vec<Option<String>>) -> Column {
    let mut parsed = Vec::with_capacity(cells.len());
    for cell in &cells {
        match cell {
            None => parsed.push(None),
            Some(s) => match s.parse::<f64>() {
                Ok(v) if v.is_finite() => parsed.push(Some(v)),
                _ => return Column::Text(cells),
            },
        }
    }
    Column::Numeric(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_numeric_and_text_columns() {
        let csv = "\u{feff}SK_ID_CURR,TARGET,NAME_CONTRACT_TYPE,AMT_ANNUITY\n\
                   100002,1,Cash loans,24700.5\n\
                   100003,0,Revolving loans,\n";
        let frame = Frame::from_reader(csv.as_bytes(), "test").unwrap();

        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.names()[0], "SK_ID_CURR");
        assert!(frame.column("TARGET").unwrap().is_numeric());
        assert!(!frame.column("NAME_CONTRACT_TYPE").unwrap().is_numeric());
        assert_eq!(
            frame.column("AMT_ANNUITY"),
            Some(&Column::Numeric(vec![Some(24700.5), None]))
        );
    }

    #[test]
    fn keys_reject_fractional_ids() {
        let csv = "id\n1\n2.5\n";
        let frame = Frame::from_reader(csv.as_bytes(), "test").unwrap();
        let keys = frame.keys("id", "test").unwrap();
        assert_eq!(keys, vec![Some(1), None]);
    }

    #[test]
    fn push_column_checks_length_and_duplicates() {
        let mut frame = Frame::new();
        frame.push_column("a", Column::Numeric(vec![Some(1.0)])).unwrap();
        assert!(frame.push_column("a", Column::Numeric(vec![Some(2.0)])).is_err());
        assert!(frame.push_column("b", Column::Numeric(vec![])).is_err());
    }

    #[test]
    fn write_then_read_keeps_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut frame = Frame::new();
        frame
            .push_column("id", Column::Numeric(vec![Some(1.0), Some(2.0)]))
            .unwrap();
        frame
            .push_column("kind", Column::Text(vec![Some("a, b".to_string()), None]))
            .unwrap();
        frame.write_csv(&path).unwrap();

        let back = Frame::read_csv(&path).unwrap();
        assert_eq!(back, frame);
    }
}
