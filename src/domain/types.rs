//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between pipeline stages without conversion
//! - exported to CSV
//! - rendered by the CLI report and the TUI

use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;

/// One of the fixed set of upstream bulletin files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum SourceKey {
    /// Actual flows for the last 31 gas days (demand).
    Flows,
    /// Medium-term capacity outlook for future gas days.
    MtoFuture,
    /// Current nameplate rating per facility.
    Nameplate,
}

impl SourceKey {
    pub const ALL: [SourceKey; 3] = [SourceKey::Flows, SourceKey::MtoFuture, SourceKey::Nameplate];

    /// File name as published upstream; also the cache entry name.
    pub fn file_name(self) -> &'static str {
        match self {
            SourceKey::Flows => "GasBBActualFlowStorageLast31.CSV",
            SourceKey::MtoFuture => "GasBBMediumTermCapacityOutlookFuture.csv",
            SourceKey::Nameplate => "GasBBNameplateRatingCurrent.csv",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKey::Flows => "flows",
            SourceKey::MtoFuture => "mto_future",
            SourceKey::Nameplate => "nameplate",
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day-specific declared capacity for one production facility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityCapacityRecord {
    pub facility_name: String,
    pub gas_day: NaiveDate,
    /// Available capacity in TJ (non-negative).
    ///
    /// `None` when the outlook row carried no usable quantity; the nameplate
    /// join fills it.
    pub tj_available: Option<f64>,
}

/// Static rated maximum output for one production facility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameplateRecord {
    pub facility_name: String,
    pub tj_nameplate: f64,
}

/// Market-wide demand for one gas day, already summed across zones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandRecord {
    pub gas_day: NaiveDate,
    pub tj_demand: f64,
}

/// One row of the supply table: outlook capacity joined with nameplate fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyRow {
    pub facility_name: String,
    pub gas_day: NaiveDate,
    pub tj_available: f64,
    pub tj_nameplate: f64,
}

/// One day of the reconciled balance.
///
/// Shortfall is derived from the two stored quantities on every access.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRow {
    pub gas_day: NaiveDate,
    /// Aggregate supply across facilities; 0 when no supply data exists for the day.
    pub tj_available: f64,
    pub tj_demand: f64,
}

impl DailyRow {
    /// `tj_available - tj_demand`; negative means a supply deficit.
    pub fn shortfall(&self) -> f64 {
        self.tj_available - self.tj_demand
    }
}

/// Why a table has the rows it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    /// The source was read and produced at least one row.
    Loaded,
    /// The source was read and every column resolved, but no row survived.
    Empty,
    /// The upstream source could not be fetched or parsed.
    SourceUnavailable,
    /// One or more required fields had no matching column.
    SchemaMismatch { missing: Vec<&'static str> },
}

/// A well-formed (possibly empty) result of a pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    pub rows: Vec<T>,
    pub status: TableStatus,
}

impl<T> Table<T> {
    /// Wrap rows produced from a readable source; status reflects emptiness.
    pub fn from_rows(rows: Vec<T>) -> Self {
        let status = if rows.is_empty() {
            TableStatus::Empty
        } else {
            TableStatus::Loaded
        };
        Self { rows, status }
    }

    pub fn unavailable() -> Self {
        Self {
            rows: Vec::new(),
            status: TableStatus::SourceUnavailable,
        }
    }

    pub fn schema_mismatch(missing: Vec<&'static str>) -> Self {
        Self {
            rows: Vec::new(),
            status: TableStatus::SchemaMismatch { missing },
        }
    }

    /// Carry an upstream status forward onto rows derived from it.
    ///
    /// A non-`Loaded` upstream status wins; otherwise the status follows the new rows.
    pub fn derived<U>(&self, rows: Vec<U>) -> Table<U> {
        match &self.status {
            TableStatus::Loaded | TableStatus::Empty => Table::from_rows(rows),
            other => Table {
                rows,
                status: other.clone(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self::from_rows(Vec::new())
    }
}

/// Per-facility, per-day supply after the nameplate join.
pub type SupplyTable = Table<SupplyRow>;

/// One row per demand gas day with aggregate supply.
pub type DailyModel = Table<DailyRow>;

/// Which capacity fallback (if any) shaped the supply table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityFallback {
    /// Outlook and nameplate were both present and joined.
    None,
    /// Outlook absent: flat nameplate projection over the forward horizon.
    NameplateProjection { horizon_days: u32 },
    /// Nameplate absent: outlook values double as nameplate.
    OutlookAsNameplate,
    /// Neither source produced rows.
    NoSupply,
}

/// The full reconciliation output consumed by the presentation layer.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub supply: SupplyTable,
    pub model: DailyModel,
    pub fallback: CapacityFallback,
}
