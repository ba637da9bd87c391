//! Model evaluation: ranking, calibration and threshold metrics.

pub mod metrics;

pub use metrics::*;
