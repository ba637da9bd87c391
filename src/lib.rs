//! `credit-risk` library crate.
//!
//! The binary (`crs`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the CLI, the HTTP server and the dashboard share one pipeline
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod client;
pub mod data;
pub mod domain;
pub mod error;
pub mod eval;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod prep;
pub mod report;
pub mod server;
pub mod tui;
