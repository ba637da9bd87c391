//! Model fitting orchestration.
//!
//! Responsibilities:
//!
//! - stratified holdout split and CV folds
//! - generate the λ grid
//! - fit L2 logistic regression by IRLS
//! - select λ by cross-validation (parallel over candidates)

pub mod lambda_grid;
pub mod selection;
pub mod split;
pub mod trainer;

pub use lambda_grid::*;
pub use selection::*;
pub use split::*;
pub use trainer::*;
