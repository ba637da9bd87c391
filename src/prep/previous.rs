//! Previous loan applications aggregated per applicant.

use std::path::Path;

use crate::error::AppError;
use crate::io::table::{Column, Frame};
use crate::prep::KEY_APPLICANT;
use crate::prep::agg::{GroupBy, Reduce, ratio};

pub const PREVIOUS_FILE: &str = "previous_application.csv";

const INPUTS: [&str; 7] = [
    "AMT_APPLICATION",
    "AMT_CREDIT",
    "AMT_DOWN_PAYMENT",
    "AMT_ANNUITY",
    "CNT_PAYMENT",
    "DAYS_DECISION",
    "SK_ID_PREV",
];

/// Aggregate `previous_application.csv` found in `dir`.
pub fn aggregate_previous(dir: &Path) -> Result<Frame, AppError> {
    let prev = Frame::read_csv(&dir.join(PREVIOUS_FILE))?;
    aggregate_previous_frame(&prev)
}

pub fn aggregate_previous_frame(prev: &Frame) -> Result<Frame, AppError> {
    let keys = prev.keys(KEY_APPLICANT, PREVIOUS_FILE)?;
    let cols = INPUTS
        .iter()
        .map(|name| prev.require_numeric(name, PREVIOUS_FILE))
        .collect::<Result<Vec<_>, _>>()?;

    let mut group = GroupBy::new(INPUTS.len());
    let mut values = vec![None; INPUTS.len()];
    for (row, key) in keys.iter().enumerate() {
        let Some(key) = *key else { continue };
        for (slot, col) in values.iter_mut().zip(&cols) {
            *slot = col[row];
        }
        group.push(key, &values);
    }

    let mut frame = group.finish(
        KEY_APPLICANT,
        &[
            ("PREV_AMT_APPLICATION_MEAN", 0, Reduce::Mean),
            ("PREV_AMT_APPLICATION_SUM", 0, Reduce::Sum),
            ("PREV_AMT_CREDIT_MEAN", 1, Reduce::Mean),
            ("PREV_AMT_CREDIT_SUM", 1, Reduce::Sum),
            ("PREV_AMT_DOWN_PAYMENT_MEAN", 2, Reduce::Mean),
            ("PREV_AMT_ANNUITY_MEAN", 3, Reduce::Mean),
            ("PREV_CNT_PAYMENT_MEAN", 4, Reduce::Mean),
            ("PREV_DAYS_DECISION_MEAN", 5, Reduce::Mean),
            ("PREV_SK_ID_PREV_COUNT", 6, Reduce::Count),
        ],
    )?;

    // Granted credit relative to what was asked for; non-finite stays missing.
    let credit_sum = frame.require_numeric("PREV_AMT_CREDIT_SUM", PREVIOUS_FILE)?;
    let app_sum = frame.require_numeric("PREV_AMT_APPLICATION_SUM", PREVIOUS_FILE)?;
    let ratios: Vec<Option<f64>> = credit_sum
        .iter()
        .zip(app_sum)
        .map(|(c, a)| ratio(*c, *a))
        .collect();
    frame.push_column("PREV_CREDIT_TO_APPLICATION_RATIO", Column::Numeric(ratios))?;

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_and_drops_infinite_ratio() {
        let prev = Frame::from_reader(
            "SK_ID_PREV,SK_ID_CURR,AMT_APPLICATION,AMT_CREDIT,AMT_DOWN_PAYMENT,AMT_ANNUITY,CNT_PAYMENT,DAYS_DECISION\n\
             1,7,100,90,,10,12,-30\n\
             2,7,300,330,5,20,24,-60\n\
             3,8,0,50,,5,6,-10\n"
                .as_bytes(),
            "test",
        )
        .unwrap();

        let out = aggregate_previous_frame(&prev).unwrap();
        assert_eq!(
            out.column("PREV_AMT_APPLICATION_SUM"),
            Some(&Column::Numeric(vec![Some(400.0), Some(0.0)]))
        );
        assert_eq!(
            out.column("PREV_AMT_DOWN_PAYMENT_MEAN"),
            Some(&Column::Numeric(vec![Some(5.0), None]))
        );
        assert_eq!(
            out.column("PREV_SK_ID_PREV_COUNT"),
            Some(&Column::Numeric(vec![Some(2.0), Some(1.0)]))
        );
        // 420 / 400 for applicant 7; 50 / 0 is infinite -> missing.
        assert_eq!(
            out.column("PREV_CREDIT_TO_APPLICATION_RATIO"),
            Some(&Column::Numeric(vec![Some(1.05), None]))
        );
    }
}
