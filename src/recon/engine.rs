//! Supply/demand reconciliation.
//!
//! Workflow:
//! outlook -> normalize -> class filter -> range expansion -> dedup
//! nameplate -> normalize -> class filter -> one row per facility
//! (fallback policy) -> nameplate join -> daily supply
//! flows -> normalize -> zone filter -> daily demand
//! daily demand LEFT JOIN daily supply -> `DailyModel`
//!
//! Every stage yields a well-formed table; only the blob cache can fail, and
//! the source reader absorbs that as an unavailable (empty) table.

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use super::fallback::project_nameplate;
use crate::data::cache::{BlobCache, Fetch};
use crate::data::filter::{filter_facility_class, retain_label};
use crate::data::reader::{RawTable, SourceReader};
use crate::data::schema::{normalize, Field, FLOWS_SCHEMA, NAMEPLATE_SCHEMA, OUTLOOK_SCHEMA};
use crate::data::dedup_capacity;
use crate::domain::{
    CapacityFallback, DailyModel, DailyRow, DemandRecord, FacilityCapacityRecord, NameplateRecord, PipelineConfig,
    Reconciled, SourceKey, SupplyRow, SupplyTable, Table,
};

/// Raw tables for the three sources of one run.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub outlook: RawTable,
    pub nameplate: RawTable,
    pub flows: RawTable,
}

/// Reads sources through the cache and reconciles them.
pub struct Engine<F> {
    reader: SourceReader<F>,
    config: PipelineConfig,
}

impl<F: Fetch> Engine<F> {
    pub fn new(config: PipelineConfig, fetcher: F) -> Self {
        let cache = BlobCache::new(&config, fetcher);
        Self {
            reader: SourceReader::new(cache),
            config,
        }
    }

    pub fn reader(&self) -> &SourceReader<F> {
        &self.reader
    }

    /// Read all sources (refetching when `force`) and reconcile them.
    pub fn reconcile(&self, force: bool) -> Reconciled {
        let tables = self.read_sources(force);
        reconcile_tables(&tables, &self.config)
    }

    pub fn read_sources(&self, force: bool) -> SourceTables {
        SourceTables {
            outlook: self.reader.read(SourceKey::MtoFuture, force),
            nameplate: self.reader.read(SourceKey::Nameplate, force),
            flows: self.reader.read(SourceKey::Flows, force),
        }
    }
}

/// Reconcile already-read source tables.
pub fn reconcile_tables(tables: &SourceTables, config: &PipelineConfig) -> Reconciled {
    let capacity = build_capacity(&tables.outlook, config);
    let nameplate = build_nameplate(&tables.nameplate, config);
    let (supply, fallback) = join_supply(&capacity, &nameplate, config);
    let demand = build_demand(&tables.flows, config);
    let model = build_daily_model(&supply, &demand);

    info!(
        supply_rows = supply.len(),
        demand_days = demand.len(),
        model_days = model.len(),
        fallback = ?fallback,
        "reconciled"
    );

    Reconciled {
        supply,
        model,
        fallback,
    }
}

/// Day-specific production capacity, one row per (facility, day).
pub fn build_capacity(raw: &RawTable, config: &PipelineConfig) -> Table<FacilityCapacityRecord> {
    let normalized = normalize(raw, &OUTLOOK_SCHEMA);
    let production = filter_facility_class(&normalized, &config.facility_class);

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in &production.table.rows {
        let (Some(name), Some(start)) = (row.text(Field::FacilityName), row.date(Field::GasDay)) else {
            dropped += 1;
            continue;
        };
        let tj_available = row.quantity(Field::Capacity);
        let days = expand_range(name, start, row.date(Field::EndDay), config.max_range_days);
        records.extend(days.into_iter().map(|gas_day| FacilityCapacityRecord {
            facility_name: name.to_string(),
            gas_day,
            tj_available,
        }));
    }
    if dropped > 0 {
        warn!(dropped, "outlook rows without facility name or valid gas day");
    }

    let deduped = dedup_capacity(&records);
    debug!(rows_in = raw.len(), rows_out = deduped.len(), "capacity outlook built");
    production.table.derived(deduped)
}

/// Inclusive day range, capped at `max_days`; a missing or inverted end is a single day.
fn expand_range(facility: &str, start: NaiveDate, end: Option<NaiveDate>, max_days: u32) -> Vec<NaiveDate> {
    let Some(end) = end.filter(|e| *e > start) else {
        return vec![start];
    };
    let full = (end - start).num_days() as u64 + 1;
    let span = full.min(u64::from(max_days.max(1)));
    if span < full {
        warn!(
            facility,
            %start,
            %end,
            dropped_days = full - span,
            "outlook range longer than {span} days, truncated"
        );
    }
    (0..span)
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .collect()
}

/// Production nameplate ratings, one row per facility (first occurrence wins).
pub fn build_nameplate(raw: &RawTable, config: &PipelineConfig) -> Table<NameplateRecord> {
    let normalized = normalize(raw, &NAMEPLATE_SCHEMA);
    let production = filter_facility_class(&normalized, &config.facility_class);

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut records = Vec::new();
    for row in &production.table.rows {
        let (Some(name), Some(tj_nameplate)) = (row.text(Field::FacilityName), row.quantity(Field::Capacity)) else {
            continue;
        };
        let count = seen.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            records.push(NameplateRecord {
                facility_name: name.to_string(),
                tj_nameplate,
            });
        }
    }
    for (name, count) in seen.iter().filter(|(_, c)| **c > 1) {
        debug!(facility = %name, rows = count, "duplicate nameplate rows, keeping first");
    }

    production.table.derived(records)
}

/// Join capacity with nameplate fallback, applying the projection policy when
/// the outlook is absent.
pub fn join_supply(
    capacity: &Table<FacilityCapacityRecord>,
    nameplate: &Table<NameplateRecord>,
    config: &PipelineConfig,
) -> (SupplyTable, CapacityFallback) {
    match (capacity.is_empty(), nameplate.is_empty()) {
        (true, true) => {
            warn!(capacity = ?capacity.status, nameplate = ?nameplate.status, "no supply data");
            (capacity.derived(Vec::new()), CapacityFallback::NoSupply)
        }
        (true, false) => {
            let projected = project_nameplate(&nameplate.rows, config.today, config.horizon_days);
            let rows = left_join_nameplate(&projected, &nameplate.rows);
            (
                nameplate.derived(rows),
                CapacityFallback::NameplateProjection {
                    horizon_days: config.horizon_days,
                },
            )
        }
        (false, true) => {
            info!(nameplate = ?nameplate.status, "nameplate absent, outlook doubles as nameplate");
            let rows: Vec<SupplyRow> = capacity
                .rows
                .iter()
                .filter_map(|rec| {
                    rec.tj_available.map(|v| SupplyRow {
                        facility_name: rec.facility_name.clone(),
                        gas_day: rec.gas_day,
                        tj_available: v,
                        tj_nameplate: v,
                    })
                })
                .collect();
            let dropped = capacity.len() - rows.len();
            if dropped > 0 {
                warn!(dropped, "capacity rows with no outlook value and no nameplate rating");
            }
            (capacity.derived(rows), CapacityFallback::OutlookAsNameplate)
        }
        (false, false) => {
            let rows = left_join_nameplate(&capacity.rows, &nameplate.rows);
            (capacity.derived(rows), CapacityFallback::None)
        }
    }
}

/// Left join on facility name; missing day-specific capacity takes the nameplate value.
///
/// Rows with neither value are dropped.
fn left_join_nameplate(capacity: &[FacilityCapacityRecord], nameplate: &[NameplateRecord]) -> Vec<SupplyRow> {
    let ratings: HashMap<&str, f64> = nameplate
        .iter()
        .map(|np| (np.facility_name.as_str(), np.tj_nameplate))
        .collect();

    let mut filled = 0usize;
    let mut dropped = 0usize;
    let mut rows = Vec::with_capacity(capacity.len());
    for rec in capacity {
        let rating = ratings.get(rec.facility_name.as_str()).copied();
        let tj_available = match (rec.tj_available, rating) {
            (Some(v), _) => v,
            (None, Some(r)) => {
                filled += 1;
                r
            }
            (None, None) => {
                dropped += 1;
                continue;
            }
        };
        rows.push(SupplyRow {
            facility_name: rec.facility_name.clone(),
            gas_day: rec.gas_day,
            tj_available,
            tj_nameplate: rating.unwrap_or(tj_available),
        });
    }

    if filled > 0 {
        debug!(filled, "capacity filled from nameplate");
    }
    if dropped > 0 {
        warn!(dropped, "capacity rows with no outlook value and no nameplate rating");
    }
    rows
}

/// Market-wide demand, one row per gas day.
pub fn build_demand(raw: &RawTable, config: &PipelineConfig) -> Table<DemandRecord> {
    let normalized = normalize(raw, &FLOWS_SCHEMA);
    let demand_zones = retain_label(&normalized, Field::ZoneType, &config.demand_zone_type);
    let market = retain_label(&demand_zones, Field::ZoneName, &config.demand_zone_name);

    // Individual flow rows may be negative; only the daily total is clamped.
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut dropped = 0usize;
    for row in &market.table.rows {
        let (Some(day), Some(qty)) = (row.date(Field::GasDay), row.signed_quantity(Field::Quantity)) else {
            dropped += 1;
            continue;
        };
        *by_day.entry(day).or_insert(0.0) += qty;
    }
    if dropped > 0 {
        warn!(dropped, "flow rows without valid gas day or quantity");
    }

    let rows = by_day
        .into_iter()
        .map(|(gas_day, total)| {
            if total < 0.0 {
                warn!(%gas_day, total, "negative daily demand, clamped to 0");
            }
            DemandRecord {
                gas_day,
                tj_demand: total.max(0.0),
            }
        })
        .collect::<Vec<_>>();
    debug!(rows_in = raw.len(), days = rows.len(), "demand built");
    market.table.derived(rows)
}

/// Daily demand LEFT JOIN daily aggregate supply; missing supply is 0.
pub fn build_daily_model(supply: &SupplyTable, demand: &Table<DemandRecord>) -> DailyModel {
    let mut supply_by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in &supply.rows {
        *supply_by_day.entry(row.gas_day).or_insert(0.0) += row.tj_available;
    }

    let rows = demand
        .rows
        .iter()
        .map(|d| DailyRow {
            gas_day: d.gas_day,
            tj_available: supply_by_day.get(&d.gas_day).copied().unwrap_or(0.0),
            tj_demand: d.tj_demand,
        })
        .collect();

    demand.derived(rows)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::data::reader::parse_csv;
    use crate::domain::TableStatus;

    #[derive(Clone, Default)]
    struct LogBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` with a thread-local subscriber; return its result and the WARN+ output.
    fn with_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
        let buf = LogBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        (out, logs)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            today: day(10),
            ..PipelineConfig::default()
        }
    }

    fn raw(csv: &str) -> RawTable {
        parse_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn capacity_dedups_overlapping_revisions() {
        let outlook = raw(
            "facilityname,facilitytype,gasday,capacity\n\
             FacilityA,production,2025-08-01,100\n\
             FacilityA,production,2025-08-01,50\n\
             FacilityB,pipeline,2025-08-01,999\n",
        );
        let cap = build_capacity(&outlook, &config());
        assert_eq!(cap.rows.len(), 1);
        assert_eq!(cap.rows[0].tj_available, Some(150.0));
    }

    #[test]
    fn capacity_ranges_expand_to_days() {
        let outlook = raw(
            "facilityname,facilitytype,fromgasdate,togasdate,capacityquantity\n\
             A,Production,2025-08-01,2025-08-03,10\n\
             A,Production,2025-08-03,2025-08-03,5\n",
        );
        let cap = build_capacity(&outlook, &config());
        let got: Vec<_> = cap.rows.iter().map(|r| (r.gas_day, r.tj_available)).collect();
        assert_eq!(
            got,
            vec![(day(1), Some(10.0)), (day(2), Some(10.0)), (day(3), Some(15.0))]
        );
    }

    #[test]
    fn range_expansion_is_capped() {
        assert_eq!(expand_range("A", day(1), Some(day(31)), 7).len(), 7);
        assert_eq!(expand_range("A", day(5), Some(day(1)), 7), vec![day(5)]);
        assert_eq!(expand_range("A", day(5), None, 7), vec![day(5)]);
    }

    #[test]
    fn truncated_range_is_reported() {
        let outlook = raw(
            "facilityname,facilitytype,fromgasdate,togasdate,capacity\n\
             A,Production,2025-08-01,2027-12-31,10\n",
        );
        let (cap, logs) = with_warnings(|| build_capacity(&outlook, &config()));
        assert_eq!(cap.rows.len(), 400);
        assert_eq!(cap.rows.last().map(|r| r.gas_day), NaiveDate::from_ymd_opt(2026, 9, 4));
        assert!(logs.contains("truncated"), "{logs}");
        assert!(logs.contains("dropped_days=483"), "{logs}");
    }

    #[test]
    fn nameplate_keeps_one_row_per_facility() {
        let np = raw(
            "facilityname,facilitytype,nameplaterating\n\
             A,Production,100\n\
             A,production,300\n\
             B,storage,50\n",
        );
        let table = build_nameplate(&np, &config());
        assert_eq!(
            table.rows,
            vec![NameplateRecord {
                facility_name: "A".to_string(),
                tj_nameplate: 100.0
            }]
        );
    }

    #[test]
    fn missing_outlook_value_takes_nameplate() {
        let cap = Table::from_rows(vec![
            FacilityCapacityRecord {
                facility_name: "A".to_string(),
                gas_day: day(1),
                tj_available: None,
            },
            FacilityCapacityRecord {
                facility_name: "A".to_string(),
                gas_day: day(2),
                tj_available: Some(40.0),
            },
            FacilityCapacityRecord {
                facility_name: "Z".to_string(),
                gas_day: day(2),
                tj_available: None,
            },
        ]);
        let np = Table::from_rows(vec![NameplateRecord {
            facility_name: "A".to_string(),
            tj_nameplate: 90.0,
        }]);

        let (supply, fallback) = join_supply(&cap, &np, &config());
        assert_eq!(fallback, CapacityFallback::None);
        let got: Vec<_> = supply.rows.iter().map(|r| (r.gas_day, r.tj_available, r.tj_nameplate)).collect();
        assert_eq!(got, vec![(day(1), 90.0, 90.0), (day(2), 40.0, 90.0)]);
    }

    #[test]
    fn absent_nameplate_uses_outlook_as_nameplate() {
        let cap = Table::from_rows(vec![FacilityCapacityRecord {
            facility_name: "A".to_string(),
            gas_day: day(1),
            tj_available: Some(70.0),
        }]);
        let (supply, fallback) = join_supply(&cap, &Table::unavailable(), &config());
        assert_eq!(fallback, CapacityFallback::OutlookAsNameplate);
        assert_eq!(supply.rows[0].tj_nameplate, 70.0);
        assert_eq!(supply.rows[0].tj_available, 70.0);
    }

    #[test]
    fn outlook_as_nameplate_reports_rows_without_value() {
        let cap = Table::from_rows(vec![
            FacilityCapacityRecord {
                facility_name: "A".to_string(),
                gas_day: day(1),
                tj_available: Some(70.0),
            },
            FacilityCapacityRecord {
                facility_name: "A".to_string(),
                gas_day: day(2),
                tj_available: None,
            },
        ]);
        let ((supply, fallback), logs) = with_warnings(|| join_supply(&cap, &Table::unavailable(), &config()));
        assert_eq!(fallback, CapacityFallback::OutlookAsNameplate);
        assert_eq!(supply.len(), 1);
        assert!(logs.contains("dropped=1"), "{logs}");
    }

    #[test]
    fn absent_outlook_projects_nameplate() {
        let np = Table::from_rows(vec![
            NameplateRecord {
                facility_name: "A".to_string(),
                tj_nameplate: 100.0,
            },
            NameplateRecord {
                facility_name: "B".to_string(),
                tj_nameplate: 20.0,
            },
        ]);
        let (supply, fallback) = join_supply(&Table::unavailable(), &np, &config());
        assert_eq!(fallback, CapacityFallback::NameplateProjection { horizon_days: 30 });
        assert_eq!(supply.len(), 60);
        assert_eq!(supply.status, TableStatus::Loaded);
        assert!(supply.rows.iter().all(|r| r.tj_available == r.tj_nameplate));
        assert_eq!(supply.rows.iter().map(|r| r.gas_day).min(), Some(day(10)));
    }

    #[test]
    fn demand_is_summed_per_day_for_the_market_zone() {
        let flows = raw(
            "gasday,zonetype,zonename,quantity\n\
             2025-08-01,demand,Whole WA,600\n\
             2025-08-01,Demand,whole wa,400\n\
             2025-08-01,demand,North,5000\n\
             2025-08-01,supply,Whole WA,7000\n\
             2025-08-02,demand,Whole WA,900\n\
             bad-date,demand,Whole WA,1\n",
        );
        let demand = build_demand(&flows, &config());
        assert_eq!(
            demand.rows,
            vec![
                DemandRecord {
                    gas_day: day(1),
                    tj_demand: 1000.0
                },
                DemandRecord {
                    gas_day: day(2),
                    tj_demand: 900.0
                },
            ]
        );
    }

    #[test]
    fn negative_flows_net_off_and_daily_total_is_clamped() {
        let flows = raw(
            "gasday,zonetype,zonename,quantity\n\
             2025-08-01,demand,whole wa,500\n\
             2025-08-01,demand,whole wa,-100\n\
             2025-08-02,demand,whole wa,-50\n",
        );
        let (demand, logs) = with_warnings(|| build_demand(&flows, &config()));
        assert_eq!(
            demand.rows,
            vec![
                DemandRecord {
                    gas_day: day(1),
                    tj_demand: 400.0
                },
                DemandRecord {
                    gas_day: day(2),
                    tj_demand: 0.0
                },
            ]
        );
        assert!(logs.contains("clamped"), "{logs}");
    }

    #[test]
    fn demand_without_zone_columns_is_empty() {
        let flows = raw("gasday,quantity\n2025-08-01,600\n");
        let demand = build_demand(&flows, &config());
        assert!(demand.is_empty());
        assert!(matches!(demand.status, TableStatus::SchemaMismatch { .. }));
    }

    #[test]
    fn model_fills_missing_supply_with_zero() {
        let supply = Table::from_rows(vec![
            SupplyRow {
                facility_name: "A".to_string(),
                gas_day: day(1),
                tj_available: 300.0,
                tj_nameplate: 300.0,
            },
            SupplyRow {
                facility_name: "B".to_string(),
                gas_day: day(1),
                tj_available: 200.0,
                tj_nameplate: 250.0,
            },
            SupplyRow {
                facility_name: "A".to_string(),
                gas_day: day(9),
                tj_available: 1.0,
                tj_nameplate: 1.0,
            },
        ]);
        let demand = Table::from_rows(vec![
            DemandRecord {
                gas_day: day(1),
                tj_demand: 450.0,
            },
            DemandRecord {
                gas_day: day(2),
                tj_demand: 100.0,
            },
        ]);

        let model = build_daily_model(&supply, &demand);
        assert_eq!(model.len(), 2);
        assert_eq!(model.rows[0].tj_available, 500.0);
        assert_eq!(model.rows[0].shortfall(), 50.0);
        assert_eq!(model.rows[1].tj_available, 0.0);
        assert_eq!(model.rows[1].shortfall(), -100.0);
    }

    #[test]
    fn empty_demand_gives_empty_model() {
        let supply = Table::from_rows(vec![SupplyRow {
            facility_name: "A".to_string(),
            gas_day: day(1),
            tj_available: 300.0,
            tj_nameplate: 300.0,
        }]);
        let model = build_daily_model(&supply, &Table::unavailable());
        assert!(model.is_empty());
        assert_eq!(model.status, TableStatus::SourceUnavailable);
    }

    #[test]
    fn all_sources_unavailable_is_well_formed() {
        let out = reconcile_tables(&SourceTables::default(), &config());
        assert!(out.supply.is_empty());
        assert!(out.model.is_empty());
        assert_eq!(out.fallback, CapacityFallback::NoSupply);
        assert_eq!(out.model.status, TableStatus::SourceUnavailable);
    }
}
