//! Credit default model: feature encoding, logistic evaluation, scoring.
//!
//! Models are plain serializable data so the trainer, the CLI scorer and the
//! HTTP server all share one representation.

pub mod features;
pub mod logistic;
pub mod scorer;

pub use features::*;
pub use logistic::*;
pub use scorer::*;
