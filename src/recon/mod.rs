//! Reconciliation of facility supply against market demand.
//!
//! - `engine`: the staged pipeline producing `(SupplyTable, DailyModel)`
//! - `fallback`: the flat nameplate projection used when the outlook is absent

pub mod engine;
pub mod fallback;

pub use engine::{reconcile_tables, Engine, SourceTables};
pub use fallback::project_nameplate;
