//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - applicant inputs (`FieldValue`, `ApplicantRecord`)
//! - scoring outputs (`RiskScore`, `Decision`, `RiskGrade`)
//! - training configuration and the saved model artifact

pub mod types;

pub use types::*;
