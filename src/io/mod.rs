//! Input/output helpers.
//!
//! - CSV exports of the supply table and daily model (`export`)

pub mod export;

pub use export::*;
