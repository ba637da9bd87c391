//! Synthetic Home-Credit style raw data.
//!
//! Generates all six raw files `prep` expects from a single seeded RNG, so the
//! same `(applicants, seed)` always yields byte-identical files.
//!
//! Each applicant carries a hidden "payment discipline" factor that drives both
//! the default outcome and their credit history (bureau debt load, late bureau
//! months, installment delays and missed payments). The prepared aggregates are
//! therefore genuinely predictive, which keeps demo models meaningful.

use std::fs::{File, create_dir_all};
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Normal};
use tracing::info;

use crate::error::AppError;
use crate::math::sigmoid;
use crate::prep::bureau::{BUREAU_BALANCE_FILE, BUREAU_FILE};
use crate::prep::installments::INSTALLMENTS_FILE;
use crate::prep::previous::PREVIOUS_FILE;
use crate::prep::{TEST_FILE, TRAIN_FILE};

/// First applicant id (matches the public dataset's numbering).
const FIRST_APPLICANT_ID: u64 = 100_001;
/// Intercept of the latent default logit; yields a default rate near 8-10%.
const BASE_LOGIT: f64 = -2.6;

const EDUCATION: [(&str, f64); 4] = [
    ("Secondary / secondary special", 0.70),
    ("Higher education", 0.24),
    ("Incomplete higher", 0.04),
    ("Lower secondary", 0.02),
];

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub applicants: usize,
    pub seed: u64,
    /// Share of applicants written to `application_test.csv` (without `TARGET`).
    pub test_fraction: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            applicants: 2000,
            seed: 42,
            test_fraction: 0.2,
        }
    }
}

/// Row counts of the generated files.
#[derive(Debug, Clone, Default)]
pub struct SampleSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub bureau_rows: usize,
    pub bureau_balance_rows: usize,
    pub previous_rows: usize,
    pub installment_rows: usize,
    pub defaults: usize,
}

impl SampleSummary {
    pub fn default_rate(&self) -> f64 {
        if self.train_rows == 0 {
            0.0
        } else {
            self.defaults as f64 / self.train_rows as f64
        }
    }
}

struct Sinks {
    train: csv::Writer<File>,
    test: csv::Writer<File>,
    bureau: csv::Writer<File>,
    balance: csv::Writer<File>,
    previous: csv::Writer<File>,
    installments: csv::Writer<File>,
}

const APPLICATION_COLUMNS: [&str; 13] = [
    "SK_ID_CURR",
    "NAME_CONTRACT_TYPE",
    "CODE_GENDER",
    "FLAG_OWN_CAR",
    "FLAG_OWN_REALTY",
    "CNT_CHILDREN",
    "AMT_INCOME_TOTAL",
    "AMT_CREDIT",
    "AMT_ANNUITY",
    "NAME_EDUCATION_TYPE",
    "DAYS_BIRTH",
    "DAYS_EMPLOYED",
    "EXT_SOURCE_2",
];

fn open(dir: &Path, name: &str, header: &[&str]) -> Result<csv::Writer<File>, AppError> {
    let path = dir.join(name);
    let file = File::create(&path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(header)
        .map_err(|e| AppError::new(2, format!("Failed to write header of {name}: {e}")))?;
    Ok(writer)
}

fn put(writer: &mut csv::Writer<File>, row: &[String]) -> Result<(), AppError> {
    writer
        .write_record(row)
        .map_err(|e| AppError::new(2, format!("Failed to write sample row: {e}")))
}

fn amount(v: f64) -> String {
    format!("{v:.2}")
}

fn days(v: f64) -> String {
    format!("{}", v.round() as i64)
}

fn opt(v: Option<String>) -> String {
    v.unwrap_or_default()
}

fn pick<'a>(rng: &mut StdRng, choices: &[(&'a str, f64)]) -> &'a str {
    let mut u: f64 = rng.r#gen();
    for &(label, p) in choices {
        if u < p {
            return label;
        }
        u -= p;
    }
    choices[choices.len() - 1].0
}

/// Write the six raw files into `dir` (created if missing).
pub fn write_sample(dir: &Path, config: &SampleConfig) -> Result<SampleSummary, AppError> {
    if config.applicants == 0 {
        return Err(AppError::new(2, "Applicant count must be > 0."));
    }
    if !(config.test_fraction.is_finite() && (0.0..1.0).contains(&config.test_fraction)) {
        return Err(AppError::new(2, "Sample test fraction must be in [0, 1)."));
    }
    create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;

    let mut train_header = APPLICATION_COLUMNS.to_vec();
    train_header.insert(1, "TARGET");
    let mut sinks = Sinks {
        train: open(dir, TRAIN_FILE, &train_header)?,
        test: open(dir, TEST_FILE, &APPLICATION_COLUMNS)?,
        bureau: open(
            dir,
            BUREAU_FILE,
            &[
                "SK_ID_CURR",
                "SK_ID_BUREAU",
                "CREDIT_ACTIVE",
                "DAYS_CREDIT",
                "AMT_CREDIT_SUM",
                "AMT_CREDIT_SUM_DEBT",
            ],
        )?,
        balance: open(dir, BUREAU_BALANCE_FILE, &["SK_ID_BUREAU", "MONTHS_BALANCE", "STATUS"])?,
        previous: open(
            dir,
            PREVIOUS_FILE,
            &[
                "SK_ID_PREV",
                "SK_ID_CURR",
                "NAME_CONTRACT_STATUS",
                "AMT_APPLICATION",
                "AMT_CREDIT",
                "AMT_DOWN_PAYMENT",
                "AMT_ANNUITY",
                "CNT_PAYMENT",
                "DAYS_DECISION",
            ],
        )?,
        installments: open(
            dir,
            INSTALLMENTS_FILE,
            &[
                "SK_ID_PREV",
                "SK_ID_CURR",
                "NUM_INSTALMENT_NUMBER",
                "DAYS_INSTALMENT",
                "DAYS_ENTRY_PAYMENT",
                "AMT_INSTALMENT",
                "AMT_PAYMENT",
            ],
        )?,
    };

    let mut generator = Generator::new(config.seed)?;
    let n_test = (config.applicants as f64 * config.test_fraction).round() as usize;
    let n_train = config.applicants - n_test;

    let mut summary = SampleSummary::default();
    for i in 0..config.applicants {
        let id = FIRST_APPLICANT_ID + i as u64;
        generator.applicant(id, i < n_train, &mut sinks, &mut summary)?;
    }

    for writer in [
        &mut sinks.train,
        &mut sinks.test,
        &mut sinks.bureau,
        &mut sinks.balance,
        &mut sinks.previous,
        &mut sinks.installments,
    ] {
        writer
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to flush sample file: {e}")))?;
    }

    info!(
        dir = %dir.display(),
        train = summary.train_rows,
        test = summary.test_rows,
        default_rate = summary.default_rate(),
        "synthetic sample written"
    );
    Ok(summary)
}

struct Generator {
    rng: StdRng,
    normal: Normal<f64>,
    income: LogNormal<f64>,
    next_bureau_id: u64,
    next_prev_id: u64,
}

impl Generator {
    fn new(seed: u64) -> Result<Self, AppError> {
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            normal: Normal::new(0.0, 1.0)
                .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?,
            income: LogNormal::new(150_000f64.ln(), 0.5)
                .map_err(|e| AppError::new(4, format!("Income distribution error: {e}")))?,
            next_bureau_id: 5_000_000,
            next_prev_id: 1_000_000,
        })
    }

    fn applicant(
        &mut self,
        id: u64,
        is_train: bool,
        sinks: &mut Sinks,
        summary: &mut SampleSummary,
    ) -> Result<(), AppError> {
        let rng = &mut self.rng;

        // Hidden payment discipline: positive = worse.
        let risk = self.normal.sample(rng);

        let income = self.income.sample(rng).clamp(25_000.0, 2_000_000.0);
        let credit = income * rng.gen_range(0.8..5.0);
        let annuity = credit / rng.gen_range(8.0..30.0);
        let age_years: f64 = rng.gen_range(21.0..68.0);
        let employed_years = rng.gen_range(0.0..(age_years - 18.0).min(40.0));
        let pensioner = age_years > 60.0 && rng.gen_bool(0.5);
        let ext_source = sigmoid(-0.9 * risk + 0.6 * self.normal.sample(rng));
        let children = if rng.gen_bool(0.3) { rng.gen_range(1..4) } else { 0 };

        let logit = BASE_LOGIT
            + 0.9 * risk
            + 0.35 * (credit / income - 2.9)
            - 0.02 * (age_years - 44.0)
            + 0.15 * children as f64;
        let defaulted = rng.gen_bool(sigmoid(logit));

        let mut row = vec![id.to_string()];
        if is_train {
            row.push(if defaulted { "1" } else { "0" }.to_string());
        }
        row.extend([
            if rng.gen_bool(0.9) { "Cash loans" } else { "Revolving loans" }.to_string(),
            if rng.gen_bool(0.65) { "F" } else { "M" }.to_string(),
            if rng.gen_bool(0.35) { "Y" } else { "N" }.to_string(),
            if rng.gen_bool(0.7) { "Y" } else { "N" }.to_string(),
            children.to_string(),
            amount(income),
            amount(credit),
            opt(rng.gen_bool(0.99).then(|| amount(annuity))),
            pick(rng, &EDUCATION).to_string(),
            days(-age_years * 365.25),
            // The public data encodes "not employed" as this sentinel.
            if pensioner { "365243".to_string() } else { days(-employed_years * 365.25) },
            opt(rng.gen_bool(0.97).then(|| format!("{ext_source:.6}"))),
        ]);
        if is_train {
            put(&mut sinks.train, &row)?;
            summary.train_rows += 1;
            summary.defaults += usize::from(defaulted);
        } else {
            put(&mut sinks.test, &row)?;
            summary.test_rows += 1;
        }

        self.bureau(id, risk, income, sinks, summary)?;
        self.previous(id, risk, sinks, summary)
    }

    fn bureau(
        &mut self,
        id: u64,
        risk: f64,
        income: f64,
        sinks: &mut Sinks,
        summary: &mut SampleSummary,
    ) -> Result<(), AppError> {
        let rng = &mut self.rng;
        let n_credits = rng.gen_range(0..6);
        for _ in 0..n_credits {
            let bureau_id = self.next_bureau_id;
            self.next_bureau_id += 1;

            let active = rng.gen_bool(0.4);
            let credit_sum = income * rng.gen_range(0.1..3.0);
            let debt_share = if active {
                sigmoid(0.8 * risk + 0.5 * self.normal.sample(rng))
            } else {
                0.0
            };
            let debt = rng.gen_bool(0.85).then(|| amount(credit_sum * debt_share));
            put(
                &mut sinks.bureau,
                &[
                    id.to_string(),
                    bureau_id.to_string(),
                    if active { "Active" } else { "Closed" }.to_string(),
                    days(-rng.gen_range(30.0..2900.0)),
                    amount(credit_sum),
                    opt(debt),
                ],
            )?;
            summary.bureau_rows += 1;

            let late_p = (0.02 + 0.08 * risk.max(0.0)).min(0.5);
            let months = rng.gen_range(1..13);
            for m in 0..months {
                let status = if rng.gen_bool(late_p) {
                    if rng.gen_bool(0.8) { "1" } else { "2" }
                } else if !active && rng.gen_bool(0.5) {
                    "C"
                } else if rng.gen_bool(0.1) {
                    "X"
                } else {
                    "0"
                };
                put(
                    &mut sinks.balance,
                    &[bureau_id.to_string(), (-m).to_string(), status.to_string()],
                )?;
                summary.bureau_balance_rows += 1;
            }
        }
        Ok(())
    }

    fn previous(
        &mut self,
        id: u64,
        risk: f64,
        sinks: &mut Sinks,
        summary: &mut SampleSummary,
    ) -> Result<(), AppError> {
        let rng = &mut self.rng;
        let n_prev = rng.gen_range(0..5);
        for _ in 0..n_prev {
            let prev_id = self.next_prev_id;
            self.next_prev_id += 1;

            let application = rng.gen_range(20_000.0..600_000.0);
            let approved = rng.gen_bool((0.85 - 0.1 * risk).clamp(0.3, 0.95));
            let credit = if approved { application * rng.gen_range(0.85..1.2) } else { 0.0 };
            let cnt_payment = [6, 12, 18, 24, 36][rng.gen_range(0..5usize)];
            let annuity = credit / cnt_payment as f64;
            let down_payment = rng
                .gen_bool(0.5)
                .then(|| amount(application * rng.gen_range(0.0..0.2)));
            let decision_day = -rng.gen_range(60.0..2900.0);

            put(
                &mut sinks.previous,
                &[
                    prev_id.to_string(),
                    id.to_string(),
                    if approved { "Approved" } else { "Refused" }.to_string(),
                    amount(application),
                    amount(credit),
                    opt(down_payment),
                    opt(approved.then(|| amount(annuity))),
                    cnt_payment.to_string(),
                    days(decision_day),
                ],
            )?;
            summary.previous_rows += 1;

            if !approved {
                continue;
            }
            let paid_instalments = cnt_payment.min(12);
            for k in 1..=paid_instalments {
                let due = decision_day + 30.0 * k as f64;
                let delay = (3.0 * self.normal.sample(rng) - 4.0 + 8.0 * risk.max(0.0)).round();
                let missed = rng.gen_bool((0.01 + 0.05 * risk.max(0.0)).min(0.5));
                let partial = rng.gen_bool((0.03 + 0.05 * risk.max(0.0)).min(0.5));
                let payment = if missed {
                    None
                } else if partial {
                    Some(annuity * rng.gen_range(0.3..0.95))
                } else {
                    Some(annuity)
                };
                put(
                    &mut sinks.installments,
                    &[
                        prev_id.to_string(),
                        id.to_string(),
                        k.to_string(),
                        days(due),
                        opt((!missed).then(|| days(due + delay))),
                        amount(annuity),
                        opt(payment.map(amount)),
                    ],
                )?;
                summary.installment_rows += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::table::Frame;

    #[test]
    fn sample_is_deterministic_and_complete() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let config = SampleConfig {
            applicants: 50,
            seed: 9,
            test_fraction: 0.2,
        };
        let summary = write_sample(a.path(), &config).unwrap();
        write_sample(b.path(), &config).unwrap();

        assert_eq!(summary.train_rows, 40);
        assert_eq!(summary.test_rows, 10);
        for name in [
            TRAIN_FILE,
            TEST_FILE,
            BUREAU_FILE,
            BUREAU_BALANCE_FILE,
            PREVIOUS_FILE,
            INSTALLMENTS_FILE,
        ] {
            let left = std::fs::read(a.path().join(name)).unwrap();
            let right = std::fs::read(b.path().join(name)).unwrap();
            assert_eq!(left, right, "{name} differs between runs");
        }

        let train = Frame::read_csv(&a.path().join(TRAIN_FILE)).unwrap();
        assert!(train.column("TARGET").unwrap().is_numeric());
        let test = Frame::read_csv(&a.path().join(TEST_FILE)).unwrap();
        assert!(test.column("TARGET").is_none());
    }

    #[test]
    fn zero_applicants_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = SampleConfig {
            applicants: 0,
            ..Default::default()
        };
        assert_eq!(write_sample(dir.path(), &config).unwrap_err().exit_code(), 2);
    }
}
