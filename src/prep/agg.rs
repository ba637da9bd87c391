//! Group-by aggregation helpers.
//!
//! Semantics follow the usual dataframe conventions:
//! - `mean` / `max` skip missing values and are missing when nothing was seen
//! - `sum` skips missing values and is `0` when nothing was seen
//! - `count` counts non-missing values
//!
//! Groups are keyed by integer ids and emitted in ascending key order.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::io::table::{Column, Frame};

/// Running statistics for one (group, column) cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    sum: f64,
    count: usize,
    max: Option<f64>,
}

impl Accumulator {
    pub fn push(&mut self, value: Option<f64>) {
        let Some(v) = value else { return };
        if !v.is_finite() {
            return;
        }
        self.sum += v;
        self.count += 1;
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

/// Reduction applied to an accumulator when emitting the output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduce {
    Mean,
    Sum,
    Max,
    Count,
}

impl Reduce {
    fn apply(self, acc: &Accumulator) -> Option<f64> {
        match self {
            Reduce::Mean => acc.mean(),
            Reduce::Sum => Some(acc.sum()),
            Reduce::Max => acc.max(),
            Reduce::Count => Some(acc.count() as f64),
        }
    }
}

/// Accumulates `width` value slots per integer key.
#[derive(Debug, Clone)]
pub struct GroupBy {
    width: usize,
    groups: BTreeMap<i64, Vec<Accumulator>>,
}

impl GroupBy {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            groups: BTreeMap::new(),
        }
    }

    /// Feed one input row. `values[i]` goes to slot `i`.
    pub fn push(&mut self, key: i64, values: &[Option<f64>]) {
        debug_assert_eq!(values.len(), self.width);
        let slots = self
            .groups
            .entry(key)
            .or_insert_with(|| vec![Accumulator::default(); self.width]);
        for (acc, v) in slots.iter_mut().zip(values) {
            acc.push(*v);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.groups.keys().copied()
    }

    pub fn get(&self, key: i64) -> Option<&[Accumulator]> {
        self.groups.get(&key).map(Vec::as_slice)
    }

    /// Emit a frame with `key_name` followed by one column per `(name, slot, reduce)`.
    pub fn finish(&self, key_name: &str, outputs: &[(&str, usize, Reduce)]) -> Result<Frame, AppError> {
        let mut frame = Frame::new();
        frame.push_column(
            key_name,
            Column::Numeric(self.groups.keys().map(|&k| Some(k as f64)).collect()),
        )?;
        for &(name, slot, reduce) in outputs {
            if slot >= self.width {
                return Err(AppError::new(4, format!("Aggregation slot {slot} out of range.")));
            }
            let values = self
                .groups
                .values()
                .map(|accs| reduce.apply(&accs[slot]))
                .collect();
            frame.push_column(name, Column::Numeric(values))?;
        }
        Ok(frame)
    }
}

/// `num / den`, with non-finite results treated as missing.
pub fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    let r = num? / den?;
    if r.is_finite() { Some(r) } else { None }
}

/// Median of the non-missing values (average of the middle pair for even counts).
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut v: Vec<f64> = values.iter().flatten().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_follow_missing_value_rules() {
        let mut g = GroupBy::new(1);
        g.push(2, &[Some(3.0)]);
        g.push(2, &[None]);
        g.push(2, &[Some(5.0)]);
        g.push(1, &[None]);

        let frame = g
            .finish(
                "id",
                &[
                    ("m", 0, Reduce::Mean),
                    ("s", 0, Reduce::Sum),
                    ("x", 0, Reduce::Max),
                    ("c", 0, Reduce::Count),
                ],
            )
            .unwrap();

        // Keys are emitted sorted: 1 then 2.
        assert_eq!(frame.column("id"), Some(&Column::Numeric(vec![Some(1.0), Some(2.0)])));
        assert_eq!(frame.column("m"), Some(&Column::Numeric(vec![None, Some(4.0)])));
        assert_eq!(frame.column("s"), Some(&Column::Numeric(vec![Some(0.0), Some(8.0)])));
        assert_eq!(frame.column("x"), Some(&Column::Numeric(vec![None, Some(5.0)])));
        assert_eq!(frame.column("c"), Some(&Column::Numeric(vec![Some(0.0), Some(2.0)])));
    }

    #[test]
    fn ratio_drops_infinities() {
        assert_eq!(ratio(Some(1.0), Some(0.0)), None);
        assert_eq!(ratio(Some(0.0), Some(0.0)), None);
        assert_eq!(ratio(Some(3.0), Some(2.0)), Some(1.5));
        assert_eq!(ratio(None, Some(2.0)), None);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), Some(1.0), Some(2.0), Some(3.0)]), Some(2.5));
        assert_eq!(median(&[None]), None);
    }
}
