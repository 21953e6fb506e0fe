//! `gas-balance` library crate.
//!
//! The binary (`gasb`) is a thin wrapper around this library so that:
//!
//! - the reconciliation pipeline is testable without spawning processes
//! - the CLI report and the TUI share one pipeline
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod recon;
pub mod report;
pub mod tui;
