//! Credit bureau history aggregated per applicant.
//!
//! Two inputs:
//! - `bureau.csv`: one row per external credit (`SK_ID_BUREAU`) of an applicant
//! - `bureau_balance.csv`: monthly status snapshots per external credit
//!
//! Output: one row per `SK_ID_CURR` with credit/debt totals, the debt-to-credit
//! ratio, and the average share of months spent in each balance status.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::error::AppError;
use crate::io::table::{Column, Frame};
use crate::prep::agg::{GroupBy, Reduce};
use crate::prep::{KEY_APPLICANT, KEY_BUREAU};

pub const BUREAU_FILE: &str = "bureau.csv";
pub const BUREAU_BALANCE_FILE: &str = "bureau_balance.csv";

/// Aggregate `bureau.csv` + `bureau_balance.csv` found in `dir`.
pub fn aggregate_bureau(dir: &Path) -> Result<Frame, AppError> {
    let bureau = Frame::read_csv(&dir.join(BUREAU_FILE))?;
    let balance = Frame::read_csv(&dir.join(BUREAU_BALANCE_FILE))?;
    aggregate_bureau_frames(&bureau, &balance)
}

/// Same as [`aggregate_bureau`] on already-loaded frames.
pub fn aggregate_bureau_frames(bureau: &Frame, balance: &Frame) -> Result<Frame, AppError> {
    let src = BUREAU_FILE;
    let curr = bureau.keys(KEY_APPLICANT, src)?;
    let bureau_ids = bureau.require_numeric(KEY_BUREAU, src)?;
    let credit = bureau.require_numeric("AMT_CREDIT_SUM", src)?;
    let debt = bureau.require_numeric("AMT_CREDIT_SUM_DEBT", src)?;
    let days = bureau.require_numeric("DAYS_CREDIT", src)?;

    // Slots: credit, debt, days, bureau id (for count).
    let mut main = GroupBy::new(4);
    for (row, key) in curr.iter().enumerate() {
        let Some(key) = *key else { continue };
        main.push(key, &[credit[row], debt[row], days[row], bureau_ids[row]]);
    }

    let mut frame = main.finish(
        KEY_APPLICANT,
        &[
            ("AMT_CREDIT_SUM_mean", 0, Reduce::Mean),
            ("AMT_CREDIT_SUM_sum", 0, Reduce::Sum),
            ("AMT_CREDIT_SUM_DEBT_mean", 1, Reduce::Mean),
            ("AMT_CREDIT_SUM_DEBT_sum", 1, Reduce::Sum),
            ("DAYS_CREDIT_mean", 2, Reduce::Mean),
            ("SK_ID_BUREAU_count", 3, Reduce::Count),
        ],
    )?;

    // Debt/credit ratio on the totals; undefined ratios are treated as "no debt".
    let ratio: Vec<Option<f64>> = main
        .keys()
        .map(|key| {
            let accs = main.get(key).unwrap_or_default();
            let r = accs
                .first()
                .zip(accs.get(1))
                .map(|(c, d)| d.sum() / c.sum())
                .filter(|r| r.is_finite());
            Some(r.unwrap_or(0.0))
        })
        .collect();
    frame.push_column("DEBT_CREDIT_RATIO", Column::Numeric(ratio))?;

    // Balance status shares, averaged per bureau credit and then per applicant.
    let (status_names, per_bureau) = balance_means(balance)?;
    let width = status_names.len();
    let mut by_applicant = GroupBy::new(width);
    let mut empty = vec![None; width];
    for (row, key) in curr.iter().enumerate() {
        let Some(key) = *key else { continue };
        let values = bureau_ids[row]
            .and_then(crate::io::table::as_key)
            .and_then(|id| per_bureau.get(&id));
        match values {
            Some(v) => by_applicant.push(key, v),
            None => {
                empty.iter_mut().for_each(|v| *v = None);
                by_applicant.push(key, &empty);
            }
        }
    }

    let outputs: Vec<(&str, usize, Reduce)> = status_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i, Reduce::Mean))
        .collect();
    let balance_frame = by_applicant.finish(KEY_APPLICANT, &outputs)?;
    crate::prep::merge_left(&mut frame, &balance_frame, KEY_APPLICANT)?;

    Ok(frame)
}

/// Per-`SK_ID_BUREAU` means of `MONTHS_BALANCE` and one-hot `STATUS_*` columns.
///
/// Returns the output column names (months first, then statuses in sorted
/// order) and the mean vector per bureau credit.
fn balance_means(balance: &Frame) -> Result<(Vec<String>, HashMap<i64, Vec<Option<f64>>>), AppError> {
    let src = BUREAU_BALANCE_FILE;
    let ids = balance.keys(KEY_BUREAU, src)?;
    let months = balance.require_numeric("MONTHS_BALANCE", src)?;
    let status = balance
        .column("STATUS")
        .ok_or_else(|| AppError::new(2, format!("Missing required column in {src}: `STATUS`")))?;

    let labels: Vec<Option<String>> = (0..balance.n_rows()).map(|row| status.label(row)).collect();
    let levels: Vec<String> = labels
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let level_idx: HashMap<&str, usize> = levels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let width = 1 + levels.len();
    let mut group = GroupBy::new(width);
    let mut row_values = vec![None; width];
    for (row, key) in ids.iter().enumerate() {
        let Some(key) = *key else { continue };
        row_values[0] = months[row];
        for v in row_values.iter_mut().skip(1) {
            *v = Some(0.0);
        }
        if let Some(i) = labels[row].as_deref().and_then(|l| level_idx.get(l)) {
            row_values[1 + i] = Some(1.0);
        }
        group.push(key, &row_values);
    }

    let mut names = Vec::with_capacity(width);
    names.push("MONTHS_BALANCE".to_string());
    names.extend(levels.iter().map(|l| format!("STATUS_{l}")));

    let means = group
        .keys()
        .map(|key| {
            let accs = group.get(key).unwrap_or_default();
            (key, accs.iter().map(|a| a.mean()).collect())
        })
        .collect();

    Ok((names, means))
}
