//! Stratified holdout split and cross-validation folds.
//!
//! Both are deterministic for a given seed: each class is shuffled with its
//! own seeded `StdRng` stream and sliced, so the class balance of every part
//! matches the input as closely as integer counts allow.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::AppError;

/// Row indices of a train/holdout split (both sorted ascending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

fn class_indices(labels: &[f64]) -> [Vec<usize>; 2] {
    let mut neg = Vec::new();
    let mut pos = Vec::new();
    for (i, &y) in labels.iter().enumerate() {
        if y == 1.0 {
            pos.push(i);
        } else {
            neg.push(i);
        }
    }
    [neg, pos]
}

/// Stratified holdout split.
///
/// Each class contributes `round(len * test_fraction)` rows to the holdout,
/// clamped so that it keeps at least one row on each side.
pub fn stratified_split(labels: &[f64], test_fraction: f64, seed: u64) -> Result<Split, AppError> {
    if !(test_fraction.is_finite() && test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::new(
            2,
            format!("Invalid test fraction {test_fraction} (must be in (0, 1))."),
        ));
    }

    let mut train = Vec::new();
    let mut holdout = Vec::new();
    for (class, mut idx) in class_indices(labels).into_iter().enumerate() {
        if idx.len() < 2 {
            return Err(AppError::new(
                3,
                format!("Class {class} has {} row(s); need at least 2 to split.", idx.len()),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(class as u64));
        idx.shuffle(&mut rng);

        let n_test = ((idx.len() as f64 * test_fraction).round() as usize).clamp(1, idx.len() - 1);
        holdout.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }

    train.sort_unstable();
    holdout.sort_unstable();
    Ok(Split { train, holdout })
}

/// Assign each row a fold id in `0..k`, dealing each shuffled class round-robin.
pub fn stratified_folds(labels: &[f64], k: usize, seed: u64) -> Result<Vec<usize>, AppError> {
    if k < 2 {
        return Err(AppError::new(2, "Cross-validation needs at least 2 folds."));
    }

    let mut folds = vec![0; labels.len()];
    for (class, mut idx) in class_indices(labels).into_iter().enumerate() {
        if idx.len() < k {
            return Err(AppError::new(
                3,
                format!(
                    "Class {class} has {} training row(s); need at least {k} for {k}-fold CV.",
                    idx.len()
                ),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1000 + class as u64));
        idx.shuffle(&mut rng);
        for (pos, &row) in idx.iter().enumerate() {
            folds[row] = pos % k;
        }
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<f64> {
        (0..100).map(|i| if i % 5 == 0 { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn split_is_stratified_and_deterministic() {
        let y = labels();
        let a = stratified_split(&y, 0.2, 7).unwrap();
        let b = stratified_split(&y, 0.2, 7).unwrap();
        assert_eq!(a, b);

        assert_eq!(a.holdout.len(), 20);
        assert_eq!(a.train.len(), 80);
        let holdout_pos = a.holdout.iter().filter(|&&i| y[i] == 1.0).count();
        assert_eq!(holdout_pos, 4);

        let c = stratified_split(&y, 0.2, 8).unwrap();
        assert_ne!(a.holdout, c.holdout);
    }

    #[test]
    fn split_requires_two_rows_per_class() {
        let y = vec![0.0, 0.0, 0.0, 1.0];
        assert_eq!(stratified_split(&y, 0.25, 1).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn folds_balance_classes() {
        let y = labels();
        let folds = stratified_folds(&y, 5, 3).unwrap();
        for f in 0..5 {
            let rows: Vec<usize> = (0..y.len()).filter(|&i| folds[i] == f).collect();
            assert_eq!(rows.len(), 20);
            assert_eq!(rows.iter().filter(|&&i| y[i] == 1.0).count(), 4);
        }
    }

    #[test]
    fn folds_need_enough_minority_rows() {
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0];
        assert_eq!(stratified_folds(&y, 3, 0).unwrap_err().exit_code(), 3);
    }
}
