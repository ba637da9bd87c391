//! Input/output helpers.
//!
//! - typed CSV tables (`table`)
//! - training data ingest + validation (`ingest`)
//! - score exports (CSV) (`export`)
//! - model artifact JSON read/write (`artifact`)

pub mod artifact;
pub mod export;
pub mod ingest;
pub mod table;

pub use artifact::*;
pub use export::*;
pub use ingest::*;
pub use table::{Column, Frame};
