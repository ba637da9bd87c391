//! Installment payment behaviour aggregated per applicant.
//!
//! Per payment row:
//! - `PAYMENT_DELAY = DAYS_ENTRY_PAYMENT - DAYS_INSTALMENT` (positive = late)
//! - `PAYMENT_RATIO = AMT_PAYMENT / AMT_INSTALMENT` (non-finite -> missing)
//! - `MISSED_PAYMENT = AMT_PAYMENT is missing or 0`

use std::path::Path;

use crate::error::AppError;
use crate::io::table::Frame;
use crate::prep::KEY_APPLICANT;
use crate::prep::agg::{GroupBy, Reduce, ratio};

pub const INSTALLMENTS_FILE: &str = "installments_payments.csv";

pub fn aggregate_installments(dir: &Path) -> Result<Frame, AppError> {
    let frame = Frame::read_csv(&dir.join(INSTALLMENTS_FILE))?;
    aggregate_installments_frame(&frame)
}

pub fn aggregate_installments_frame(inst: &Frame) -> Result<Frame, AppError> {
    let src = INSTALLMENTS_FILE;
    let keys = inst.keys(KEY_APPLICANT, src)?;
    let days_inst = inst.require_numeric("DAYS_INSTALMENT", src)?;
    let days_entry = inst.require_numeric("DAYS_ENTRY_PAYMENT", src)?;
    let amt_inst = inst.require_numeric("AMT_INSTALMENT", src)?;
    let amt_pay = inst.require_numeric("AMT_PAYMENT", src)?;

    // Slots: delay, ratio, missed flag, payment amount.
    let mut group = GroupBy::new(4);
    for (row, key) in keys.iter().enumerate() {
        let Some(key) = *key else { continue };
        let delay = days_entry[row].zip(days_inst[row]).map(|(e, i)| e - i);
        let pay_ratio = ratio(amt_pay[row], amt_inst[row]);
        let missed = match amt_pay[row] {
            None => 1.0,
            Some(v) if v == 0.0 => 1.0,
            Some(_) => 0.0,
        };
        group.push(key, &[delay, pay_ratio, Some(missed), amt_pay[row]]);
    }

    group.finish(
        KEY_APPLICANT,
        &[
            ("INSTALL_PAYMENT_DELAY_MEAN", 0, Reduce::Mean),
            ("INSTALL_PAYMENT_DELAY_MAX", 0, Reduce::Max),
            ("INSTALL_PAYMENT_RATIO_MEAN", 1, Reduce::Mean),
            ("INSTALL_MISSED_PAYMENT_SUM", 2, Reduce::Sum),
            ("INSTALL_AMT_PAYMENT_SUM", 3, Reduce::Sum),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::table::Column;

    #[test]
    fn delay_ratio_and_missed_payments() {
        let inst = Frame::from_reader(
            "SK_ID_CURR,DAYS_INSTALMENT,DAYS_ENTRY_PAYMENT,AMT_INSTALMENT,AMT_PAYMENT\n\
             5,-30,-25,100,100\n\
             5,-60,-70,100,50\n\
             5,-90,,100,\n\
             6,-10,-10,0,0\n"
                .as_bytes(),
            "test",
        )
        .unwrap();

        let out = aggregate_installments_frame(&inst).unwrap();
        // Delays 5 and -10 (third row has no entry date).
        assert_eq!(
            out.column("INSTALL_PAYMENT_DELAY_MEAN"),
            Some(&Column::Numeric(vec![Some(-2.5), Some(0.0)]))
        );
        assert_eq!(
            out.column("INSTALL_PAYMENT_DELAY_MAX"),
            Some(&Column::Numeric(vec![Some(5.0), Some(0.0)]))
        );
        // 0 / 0 is not a ratio.
        assert_eq!(
            out.column("INSTALL_PAYMENT_RATIO_MEAN"),
            Some(&Column::Numeric(vec![Some(0.75), None]))
        );
        assert_eq!(
            out.column("INSTALL_MISSED_PAYMENT_SUM"),
            Some(&Column::Numeric(vec![Some(1.0), Some(1.0)]))
        );
        assert_eq!(
            out.column("INSTALL_AMT_PAYMENT_SUM"),
            Some(&Column::Numeric(vec![Some(150.0), Some(0.0)]))
        );
    }
}
