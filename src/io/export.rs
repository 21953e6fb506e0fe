//! Export the reconciled tables to CSV.
//!
//! Meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{DailyModel, SupplyTable};
use crate::error::AppError;
use crate::report::{adjusted_rows, Adjustment};

const MODEL_HEADER: [&str; 6] = [
    "gas_day",
    "tj_available",
    "tj_demand",
    "shortfall",
    "tj_demand_adjusted",
    "shortfall_adjusted",
];
const SUPPLY_HEADER: [&str; 4] = ["facility_name", "gas_day", "tj_available", "tj_nameplate"];

#[derive(Debug, Serialize)]
struct ModelCsvRow {
    gas_day: NaiveDate,
    tj_available: f64,
    tj_demand: f64,
    shortfall: f64,
    tj_demand_adjusted: f64,
    shortfall_adjusted: f64,
}

/// Write the daily model, with adjusted columns for `adjustment`.
pub fn write_model_csv(path: &Path, model: &DailyModel, adjustment: Adjustment) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    // `serialize` only emits a header alongside the first row.
    if model.rows.is_empty() {
        write_header(&mut writer, &MODEL_HEADER)?;
    }

    let adjusted = adjusted_rows(&model.rows, adjustment);
    for (row, adj) in model.rows.iter().zip(&adjusted) {
        writer
            .serialize(ModelCsvRow {
                gas_day: row.gas_day,
                tj_available: row.tj_available,
                tj_demand: row.tj_demand,
                shortfall: row.shortfall(),
                tj_demand_adjusted: adj.tj_demand,
                shortfall_adjusted: adj.shortfall(),
            })
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

/// Write the per-facility supply table.
pub fn write_supply_csv(path: &Path, supply: &SupplyTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    if supply.rows.is_empty() {
        write_header(&mut writer, &SUPPLY_HEADER)?;
    }

    for row in &supply.rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

fn write_header<W: std::io::Write>(writer: &mut csv::Writer<W>, header: &[&str]) -> Result<(), AppError> {
    writer
        .write_record(header)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))
}
