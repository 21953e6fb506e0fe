//! Nameplate projection fallback.
//!
//! When the capacity outlook publishes no forward rows at all, supply is
//! projected flat at each facility's nameplate rating for a fixed number of
//! days starting at `start`. This is a named policy so callers can report when
//! it shaped the result.

use chrono::{Days, NaiveDate};
use tracing::info;

use crate::domain::{FacilityCapacityRecord, NameplateRecord};

/// One row per facility per day of `[start, start + horizon_days)`.
pub fn project_nameplate(
    nameplate: &[NameplateRecord],
    start: NaiveDate,
    horizon_days: u32,
) -> Vec<FacilityCapacityRecord> {
    let days: Vec<NaiveDate> = (0..u64::from(horizon_days))
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .collect();

    let mut out = Vec::with_capacity(nameplate.len() * days.len());
    for np in nameplate {
        for day in &days {
            out.push(FacilityCapacityRecord {
                facility_name: np.facility_name.clone(),
                gas_day: *day,
                tj_available: Some(np.tj_nameplate),
            });
        }
    }

    info!(
        facilities = nameplate.len(),
        horizon_days,
        %start,
        rows = out.len(),
        "outlook absent, projecting nameplate capacity"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_every_facility_over_the_horizon() {
        let nameplate = vec![
            NameplateRecord {
                facility_name: "Alpha".to_string(),
                tj_nameplate: 250.0,
            },
            NameplateRecord {
                facility_name: "Beta".to_string(),
                tj_nameplate: 80.5,
            },
        ];
        let start = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();

        let rows = project_nameplate(&nameplate, start, 30);
        assert_eq!(rows.len(), 2 * 30);

        for np in &nameplate {
            let mine: Vec<_> = rows.iter().filter(|r| r.facility_name == np.facility_name).collect();
            assert_eq!(mine.len(), 30);
            assert!(mine.iter().all(|r| r.tj_available == Some(np.tj_nameplate)));
            assert_eq!(mine.first().unwrap().gas_day, start);
            assert_eq!(mine.last().unwrap().gas_day, NaiveDate::from_ymd_opt(2026, 1, 18).unwrap());
        }
    }

    #[test]
    fn empty_nameplate_projects_nothing() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(project_nameplate(&[], start, 30).is_empty());
    }
}
