//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the fixed set of upstream sources (`SourceKey`)
//! - normalized records (`FacilityCapacityRecord`, `NameplateRecord`, `DemandRecord`)
//! - stage outputs that are always well-formed (`Table`, `SupplyTable`, `DailyModel`)
//! - pipeline configuration (`PipelineConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
