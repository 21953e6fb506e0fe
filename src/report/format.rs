//! Formatted terminal output for `gasb report` and `gasb check`.
//!
//! Formatting lives here so the pipeline code stays free of presentation and
//! output changes stay localized.

use crate::domain::{CapacityFallback, Reconciled, TableStatus};

use super::{AdjustedRow, Adjustment, BalanceSummary, DataOrigin};

/// Header block: data origin, fallback policy, adjustment and headline figures.
pub fn format_run_summary(
    reconciled: &Reconciled,
    summary: &BalanceSummary,
    origin: DataOrigin,
    adjustment: Adjustment,
) -> String {
    let mut out = String::new();

    out.push_str("=== gasb - Gas Supply & Demand Balance ===\n");
    out.push_str(&format!("Data: {}\n", origin.label()));
    out.push_str(&format!(
        "Supply: {} rows ({}) | fallback: {}\n",
        reconciled.supply.len(),
        fmt_status(&reconciled.supply.status),
        fmt_fallback(reconciled.fallback),
    ));
    out.push_str(&format!(
        "Model: {} days ({})\n",
        reconciled.model.len(),
        fmt_status(&reconciled.model.status),
    ));
    out.push_str(&format!(
        "Adjustment: {} TJ/d (default {}, demand shift {:+.0} TJ)\n",
        adjustment.value(),
        Adjustment::DEFAULT,
        adjustment.demand_delta(),
    ));

    match (summary.first_day, summary.last_day) {
        (Some(first), Some(last)) => {
            out.push_str(&format!("Range: {first} .. {last} ({} days)\n", summary.days));
        }
        _ => out.push_str("Range: -\n"),
    }
    out.push_str(&format!("Deficit days: {}\n", summary.deficit_days));
    if let Some((day, v)) = summary.min_shortfall {
        out.push_str(&format!("Tightest day: {day} ({v:.1} TJ)\n"));
    }
    if let Some(mean) = summary.mean_shortfall {
        out.push_str(&format!("Mean balance: {mean:.1} TJ\n"));
    }

    out
}

/// Daily table of supply, demand and balance.
pub fn format_daily_table(rows: &[AdjustedRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:>12} {:>12} {:>12}\n",
        "gas_day", "available", "demand", "shortfall"
    ));
    out.push_str(&format!("{:-<12} {:-<12} {:-<12} {:-<12}\n", "", "", "", ""));

    for r in rows {
        out.push_str(&format!(
            "{:<12} {:>12.1} {:>12.1} {:>12.1}\n",
            r.gas_day.to_string(),
            r.tj_available,
            r.tj_demand,
            r.shortfall(),
        ));
    }

    out
}

/// Per-facility supply totals.
pub fn format_facilities(totals: &[(String, usize, f64)]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<32} {:>6} {:>14}\n", "facility", "days", "total_tj"));
    out.push_str(&format!("{:-<32} {:-<6} {:-<14}\n", "", "", ""));
    for (name, days, total) in totals {
        out.push_str(&format!("{:<32} {:>6} {:>14.1}\n", truncate(name, 32), days, total));
    }
    out
}

pub fn fmt_status(status: &TableStatus) -> String {
    match status {
        TableStatus::Loaded => "loaded".to_string(),
        TableStatus::Empty => "empty".to_string(),
        TableStatus::SourceUnavailable => "source unavailable".to_string(),
        TableStatus::SchemaMismatch { missing } => format!("missing columns: {}", missing.join(", ")),
    }
}

pub fn fmt_fallback(fallback: CapacityFallback) -> String {
    match fallback {
        CapacityFallback::None => "none".to_string(),
        CapacityFallback::NameplateProjection { horizon_days } => {
            format!("nameplate projection ({horizon_days} days)")
        }
        CapacityFallback::OutlookAsNameplate => "outlook used as nameplate".to_string(),
        CapacityFallback::NoSupply => "no supply data".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn daily_table_has_one_line_per_row() {
        let rows = vec![
            AdjustedRow {
                gas_day: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                tj_available: 1000.0,
                tj_demand: 1200.0,
            },
            AdjustedRow {
                gas_day: NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
                tj_available: 1000.0,
                tj_demand: 900.0,
            },
        ];
        let table = format_daily_table(&rows);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("2025-08-01"));
        assert!(lines[2].ends_with("-200.0"));
        assert!(lines[3].ends_with("100.0"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[test]
    fn status_distinguishes_empty_from_missing_columns() {
        assert_eq!(fmt_status(&TableStatus::Empty), "empty");
        assert_eq!(
            fmt_status(&TableStatus::SchemaMismatch {
                missing: vec!["gas_day", "quantity"]
            }),
            "missing columns: gas_day, quantity"
        );
    }
}
