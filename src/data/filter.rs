//! Label-based row selection (facility class, demand zone).
//!
//! Matching is case-insensitive and whitespace-tolerant, against a small fixed
//! set of accepted spellings for the target label. A missing label column
//! selects nothing.

use tracing::{debug, warn};

use super::schema::{Field, Normalized, NormalizedRow};
use crate::domain::{Table, TableStatus};

/// Lower-case and collapse internal whitespace.
pub fn normalize_label(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spellings accepted for `target`, already normalized.
///
/// The production class has been published under several spellings; any other
/// target is accepted only as itself.
pub fn accepted_spellings(target: &str) -> Vec<String> {
    let target = normalize_label(target);
    match target.as_str() {
        "production" | "prod" | "production facility" | "productionfacility" => vec![
            "production".to_string(),
            "prod".to_string(),
            "production facility".to_string(),
            "productionfacility".to_string(),
        ],
        _ => vec![target],
    }
}

pub fn label_matches(value: &str, accepted: &[String]) -> bool {
    let value = normalize_label(value);
    accepted.iter().any(|a| *a == value)
}

/// Keep rows whose `field` matches `target`.
///
/// When the source never resolved `field`, the result is empty and tagged as a
/// schema mismatch naming that field.
pub fn retain_label(input: &Normalized, field: Field, target: &str) -> Normalized {
    if !input.has_field(field) {
        if input.table.status == TableStatus::Loaded || input.table.status == TableStatus::Empty {
            warn!(%field, target, "label column absent, selecting nothing");
            return Normalized {
                table: Table::schema_mismatch(vec![field.as_str()]),
                resolved: input.resolved.clone(),
            };
        }
        return input.clone();
    }

    let accepted = accepted_spellings(target);
    let rows: Vec<NormalizedRow> = input
        .table
        .rows
        .iter()
        .filter(|row| row.text(field).is_some_and(|v| label_matches(v, &accepted)))
        .cloned()
        .collect();

    debug!(%field, target, rows_in = input.table.len(), rows_out = rows.len(), "label filter");

    Normalized {
        table: input.table.derived(rows),
        resolved: input.resolved.clone(),
    }
}

/// Keep only facilities of the given class.
pub fn filter_facility_class(input: &Normalized, class: &str) -> Normalized {
    retain_label(input, Field::FacilityType, class)
}
