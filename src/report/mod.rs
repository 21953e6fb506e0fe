//! Presentation-side views of the reconciled model.
//!
//! Nothing here mutates the engine's `DailyModel`: the demand adjustment and the
//! placeholder dataset both produce separate display rows.

use chrono::{Days, NaiveDate};

use crate::domain::{DailyModel, DailyRow, Reconciled};

pub mod format;

pub use format::*;

/// Consumption override for a single large consumer, in TJ/day.
///
/// The canonical model already includes the default consumption; the display
/// shifts demand by `value - DEFAULT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    value: u8,
}

impl Adjustment {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 100;
    pub const DEFAULT: u8 = 80;
    pub const STEP: u8 = 5;

    /// Clamp into range and snap to the nearest step.
    pub fn new(value: u8) -> Self {
        let clamped = value.clamp(Self::MIN, Self::MAX);
        let snapped = ((clamped + Self::STEP / 2) / Self::STEP) * Self::STEP;
        Self {
            value: snapped.min(Self::MAX),
        }
    }

    pub fn value(self) -> u8 {
        self.value
    }

    pub fn increment(self) -> Self {
        Self::new(self.value.saturating_add(Self::STEP))
    }

    pub fn decrement(self) -> Self {
        Self::new(self.value.saturating_sub(Self::STEP))
    }

    /// Shift applied to demand for display.
    pub fn demand_delta(self) -> f64 {
        f64::from(self.value) - f64::from(Self::DEFAULT)
    }
}

impl Default for Adjustment {
    fn default() -> Self {
        Self { value: Self::DEFAULT }
    }
}

/// One display row: canonical values plus the adjusted demand.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedRow {
    pub gas_day: NaiveDate,
    pub tj_available: f64,
    pub tj_demand: f64,
}

impl AdjustedRow {
    pub fn shortfall(&self) -> f64 {
        self.tj_available - self.tj_demand
    }
}

/// Apply `adjustment` to a copy of the model rows.
pub fn adjusted_rows(rows: &[DailyRow], adjustment: Adjustment) -> Vec<AdjustedRow> {
    let delta = adjustment.demand_delta();
    rows.iter()
        .map(|r| AdjustedRow {
            gas_day: r.gas_day,
            tj_available: r.tj_available,
            tj_demand: r.tj_demand + delta,
        })
        .collect()
}

/// Where the displayed rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Live,
    /// The model was empty; rows are the labelled sample dataset.
    Placeholder,
}

impl DataOrigin {
    pub fn label(self) -> &'static str {
        match self {
            DataOrigin::Live => "live bulletin data",
            DataOrigin::Placeholder => "SAMPLE DATA (no live model available)",
        }
    }
}

/// Rows to display: the live model, or the placeholder when the model is empty.
pub fn display_rows(model: &DailyModel) -> (Vec<DailyRow>, DataOrigin) {
    if model.is_empty() {
        (placeholder_rows(), DataOrigin::Placeholder)
    } else {
        (model.rows.clone(), DataOrigin::Live)
    }
}

/// Thirty days from 2025-07-28: supply `1800 + 5i`, demand `1600 + 3i`.
pub fn placeholder_rows() -> Vec<DailyRow> {
    let Some(start) = NaiveDate::from_ymd_opt(2025, 7, 28) else {
        return Vec::new();
    };
    (0..30u32)
        .filter_map(|i| {
            start.checked_add_days(Days::new(u64::from(i))).map(|gas_day| DailyRow {
                gas_day,
                tj_available: 1800.0 + 5.0 * f64::from(i),
                tj_demand: 1600.0 + 3.0 * f64::from(i),
            })
        })
        .collect()
}

/// Headline figures for a set of display rows.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSummary {
    pub days: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub deficit_days: usize,
    pub min_shortfall: Option<(NaiveDate, f64)>,
    pub mean_shortfall: Option<f64>,
}

pub fn summarize(rows: &[AdjustedRow]) -> BalanceSummary {
    let deficit_days = rows.iter().filter(|r| r.shortfall() < 0.0).count();
    let min_shortfall = rows
        .iter()
        .map(|r| (r.gas_day, r.shortfall()))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let mean_shortfall = if rows.is_empty() {
        None
    } else {
        Some(rows.iter().map(AdjustedRow::shortfall).sum::<f64>() / rows.len() as f64)
    };

    BalanceSummary {
        days: rows.len(),
        first_day: rows.first().map(|r| r.gas_day),
        last_day: rows.last().map(|r| r.gas_day),
        deficit_days,
        min_shortfall,
        mean_shortfall,
    }
}

/// Per-facility totals over the supply table, largest first.
pub fn facility_totals(reconciled: &Reconciled) -> Vec<(String, usize, f64)> {
    let mut totals: std::collections::BTreeMap<&str, (usize, f64)> = std::collections::BTreeMap::new();
    for row in &reconciled.supply.rows {
        let entry = totals.entry(row.facility_name.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += row.tj_available;
    }
    let mut out: Vec<(String, usize, f64)> = totals
        .into_iter()
        .map(|(name, (days, total))| (name.to_string(), days, total))
        .collect();
    out.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    out
}
