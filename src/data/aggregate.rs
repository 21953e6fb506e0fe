//! Collapse duplicate (facility, day) capacity records by summation.
//!
//! Successive outlook revisions can publish overlapping ranges for the same
//! facility, so this must run before any join on facility or day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::FacilityCapacityRecord;

/// Group by `(facility_name, gas_day)` and sum `tj_available`.
///
/// Output has exactly one row per distinct key, ordered by key. Missing values
/// contribute nothing to the sum; a key whose values are all missing stays missing.
pub fn dedup_capacity(records: &[FacilityCapacityRecord]) -> Vec<FacilityCapacityRecord> {
    let mut groups: BTreeMap<(String, NaiveDate), (Option<f64>, usize)> = BTreeMap::new();

    for rec in records {
        let entry = groups
            .entry((rec.facility_name.clone(), rec.gas_day))
            .or_insert((None, 0));
        entry.0 = match (entry.0, rec.tj_available) {
            (Some(acc), Some(v)) => Some(acc + v),
            (acc, None) => acc,
            (None, v) => v,
        };
        entry.1 += 1;
    }

    let mut merged = 0usize;
    let out: Vec<FacilityCapacityRecord> = groups
        .into_iter()
        .map(|((facility_name, gas_day), (tj_available, count))| {
            if count > 1 {
                merged += 1;
                debug!(facility = %facility_name, %gas_day, rows = count, "deduplicated key");
            }
            FacilityCapacityRecord {
                facility_name,
                gas_day,
                tj_available,
            }
        })
        .collect();

    debug!(rows_in = records.len(), rows_out = out.len(), keys_merged = merged, "capacity dedup");
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn rec(name: &str, day: u32, v: Option<f64>) -> FacilityCapacityRecord {
        FacilityCapacityRecord {
            facility_name: name.to_string(),
            gas_day: NaiveDate::from_ymd_opt(2025, 8, day).unwrap(),
            tj_available: v,
        }
    }

    #[test]
    fn overlapping_rows_are_summed() {
        let out = dedup_capacity(&[rec("FacilityA", 1, Some(100.0)), rec("FacilityA", 1, Some(50.0))]);
        assert_eq!(out, vec![rec("FacilityA", 1, Some(150.0))]);
    }

    #[test]
    fn keys_are_unique_and_sums_preserved() {
        let input = vec![
            rec("A", 1, Some(1.0)),
            rec("B", 1, Some(2.0)),
            rec("A", 2, Some(3.0)),
            rec("A", 1, Some(4.0)),
            rec("B", 1, Some(5.5)),
            rec("C", 3, None),
            rec("A", 2, None),
        ];
        let out = dedup_capacity(&input);

        let keys: HashSet<_> = out.iter().map(|r| (r.facility_name.clone(), r.gas_day)).collect();
        assert_eq!(keys.len(), out.len());
        assert_eq!(out.len(), 4);

        for row in &out {
            let expected: Option<f64> = input
                .iter()
                .filter(|r| r.facility_name == row.facility_name && r.gas_day == row.gas_day)
                .filter_map(|r| r.tj_available)
                .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v));
            assert_eq!(row.tj_available, expected);
        }
    }

    #[test]
    fn empty_in_empty_out() {
        assert!(dedup_capacity(&[]).is_empty());
    }
}
