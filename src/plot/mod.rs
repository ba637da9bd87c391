//! Plotting helpers.
//!
//! - ASCII plots are rendered directly into a `String` for terminal output.

pub mod ascii;

pub use ascii::*;
