//! Map drifting upstream column names onto a stable internal schema.
//!
//! Each source declares, per semantic field, an ordered list of acceptable
//! column names. The first candidate present in the file wins. When a required
//! field has no candidate the whole source is treated as structurally absent
//! and an empty table tagged `SchemaMismatch` is returned instead of an error.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use super::reader::RawTable;
use crate::domain::{Table, TableStatus};

/// Canonical field names used after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FacilityName,
    FacilityType,
    GasDay,
    /// Inclusive end of a date range, when a source publishes ranges.
    EndDay,
    Capacity,
    ZoneType,
    ZoneName,
    Quantity,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::FacilityName => "facility_name",
            Field::FacilityType => "facility_type",
            Field::GasDay => "gas_day",
            Field::EndDay => "end_day",
            Field::Capacity => "capacity",
            Field::ZoneType => "zone_type",
            Field::ZoneName => "zone_name",
            Field::Quantity => "quantity",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered column-name candidates for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    /// Lower-case column names, most preferred first.
    pub synonyms: &'static [&'static str],
    pub required: bool,
}

/// The declared synonym table for one source.
#[derive(Debug, Clone, Copy)]
pub struct SchemaMap {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

const FACILITY_NAME: FieldSpec = FieldSpec {
    field: Field::FacilityName,
    synonyms: &["facilityname", "facility_name", "facility"],
    required: true,
};

// Optional at this stage: the facility filter fails closed when it is absent.
const FACILITY_TYPE: FieldSpec = FieldSpec {
    field: Field::FacilityType,
    synonyms: &["facilitytype", "facility_type", "facilityclass", "facility_class"],
    required: false,
};

/// Day-specific capacity outlook.
pub const OUTLOOK_SCHEMA: SchemaMap = SchemaMap {
    name: "capacity_outlook",
    fields: &[
        FACILITY_NAME,
        FACILITY_TYPE,
        FieldSpec {
            field: Field::GasDay,
            synonyms: &["gasday", "gasdate", "fromgasdate", "gas_day", "startdate", "fromdate"],
            required: true,
        },
        FieldSpec {
            field: Field::EndDay,
            synonyms: &["togasdate", "enddate", "todate"],
            required: false,
        },
        FieldSpec {
            field: Field::Capacity,
            synonyms: &["capacity", "capacityquantity", "outlookquantity", "nameplaterating"],
            required: true,
        },
    ],
};

/// Static nameplate rating per facility.
pub const NAMEPLATE_SCHEMA: SchemaMap = SchemaMap {
    name: "nameplate",
    fields: &[
        FACILITY_NAME,
        FACILITY_TYPE,
        FieldSpec {
            field: Field::Capacity,
            synonyms: &["nameplaterating", "capacityquantity", "capacity"],
            required: true,
        },
    ],
};

/// Actual flows, from which market demand is derived.
pub const FLOWS_SCHEMA: SchemaMap = SchemaMap {
    name: "flows",
    fields: &[
        FieldSpec {
            field: Field::GasDay,
            synonyms: &["gasday", "gasdate", "gas_day"],
            required: true,
        },
        FieldSpec {
            field: Field::ZoneType,
            synonyms: &["zonetype", "zone_type"],
            required: false,
        },
        FieldSpec {
            field: Field::ZoneName,
            synonyms: &["zonename", "zone_name", "zone"],
            required: false,
        },
        FieldSpec {
            field: Field::Quantity,
            synonyms: &["quantity", "actualquantity", "quantity_tj"],
            required: true,
        },
    ],
};

/// One record with values bound to canonical field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    values: BTreeMap<Field, String>,
}

impl NormalizedRow {
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Non-negative, finite number; anything else reads as missing.
    pub fn quantity(&self, field: Field) -> Option<f64> {
        self.text(field).and_then(parse_quantity)
    }

    /// Finite number of either sign (flow rows can net off).
    pub fn signed_quantity(&self, field: Field) -> Option<f64> {
        self.text(field).and_then(parse_signed_quantity)
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        self.text(field).and_then(parse_date)
    }
}

/// Output of normalization: rows plus which column each field resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: Table<NormalizedRow>,
    pub resolved: BTreeMap<Field, &'static str>,
}

impl Normalized {
    pub fn has_field(&self, field: Field) -> bool {
        self.resolved.contains_key(&field)
    }

    fn empty(table: Table<NormalizedRow>) -> Self {
        Self {
            table,
            resolved: BTreeMap::new(),
        }
    }
}

/// Resolve each field to its first present synonym.
pub fn resolve_columns(headers: &[String], schema: &SchemaMap) -> (BTreeMap<Field, &'static str>, Vec<&'static str>) {
    let mut resolved = BTreeMap::new();
    let mut missing = Vec::new();

    for spec in schema.fields {
        let hit = spec
            .synonyms
            .iter()
            .find(|candidate| headers.iter().any(|h| h == *candidate));
        match hit {
            Some(column) => {
                resolved.insert(spec.field, *column);
            }
            None if spec.required => missing.push(spec.field.as_str()),
            None => {}
        }
    }

    (resolved, missing)
}

/// Bind raw rows to canonical fields using `schema`.
pub fn normalize(raw: &RawTable, schema: &SchemaMap) -> Normalized {
    if !raw.available {
        return Normalized::empty(Table::unavailable());
    }

    let (resolved, missing) = resolve_columns(&raw.headers, schema);
    if !missing.is_empty() {
        warn!(
            schema = schema.name,
            missing = ?missing,
            columns = ?raw.headers,
            "required fields not found, treating source as absent"
        );
        return Normalized::empty(Table::schema_mismatch(missing));
    }

    for (field, column) in &resolved {
        debug!(schema = schema.name, %field, column, "synonym matched");
    }

    let header_map = raw.header_map();
    let indices: Vec<(Field, usize)> = resolved
        .iter()
        .filter_map(|(field, column)| header_map.get(column).map(|idx| (*field, *idx)))
        .collect();

    let rows: Vec<NormalizedRow> = raw
        .records()
        .map(|record| {
            let values = indices
                .iter()
                .filter_map(|(field, idx)| record.value_at(*idx).map(|v| (*field, v.to_string())))
                .collect();
            NormalizedRow { values }
        })
        .collect();

    debug!(schema = schema.name, rows = rows.len(), "normalized");

    Normalized {
        table: Table {
            status: if rows.is_empty() { TableStatus::Empty } else { TableStatus::Loaded },
            rows,
        },
        resolved,
    }
}

/// Parse a date in any of the forms the bulletin files have used.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const DATE_FMTS: [&str; 6] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d %b %Y", "%d-%b-%Y"];
    const DATETIME_FMTS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];

    let s = s.trim();
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parse a finite number, tolerating thousands separators.
pub fn parse_signed_quantity(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    let v = cleaned.parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Like [`parse_signed_quantity`], but negative values read as missing.
pub fn parse_quantity(s: &str) -> Option<f64> {
    parse_signed_quantity(s).filter(|v| *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reader::parse_csv;

    #[test]
    fn first_matching_synonym_wins() {
        let raw = parse_csv(b"facilityname,capacityquantity,nameplaterating\nAlpha,10,99\n").unwrap();
        let out = normalize(&raw, &NAMEPLATE_SCHEMA);
        assert_eq!(out.resolved.get(&Field::Capacity), Some(&"nameplaterating"));
        assert_eq!(out.table.rows[0].quantity(Field::Capacity), Some(99.0));
        assert!(!out.has_field(Field::FacilityType));
    }

    #[test]
    fn renamed_date_column_still_resolves() {
        let before = parse_csv(b"gasday,zonetype,zonename,quantity\n2025-08-01,demand,Whole WA,900\n").unwrap();
        let after = parse_csv(b"gasdate,zonetype,zonename,quantity\n2025-08-01,demand,Whole WA,900\n").unwrap();

        let a = normalize(&before, &FLOWS_SCHEMA);
        let b = normalize(&after, &FLOWS_SCHEMA);
        assert_eq!(a.table.rows, b.table.rows);
        assert_eq!(b.resolved.get(&Field::GasDay), Some(&"gasdate"));
        assert_eq!(
            b.table.rows[0].date(Field::GasDay),
            NaiveDate::from_ymd_opt(2025, 8, 1)
        );
    }

    #[test]
    fn missing_required_field_yields_tagged_empty_table() {
        let raw = parse_csv(b"facilityname,facilitytype\nAlpha,production\n").unwrap();
        let out = normalize(&raw, &NAMEPLATE_SCHEMA);
        assert!(out.table.is_empty());
        assert_eq!(
            out.table.status,
            TableStatus::SchemaMismatch {
                missing: vec!["capacity"]
            }
        );
    }

    #[test]
    fn unavailable_source_stays_unavailable() {
        let out = normalize(&RawTable::unavailable(), &OUTLOOK_SCHEMA);
        assert!(out.table.is_empty());
        assert_eq!(out.table.status, TableStatus::SourceUnavailable);
    }

    #[test]
    fn header_only_file_is_empty_not_mismatched() {
        let raw = parse_csv(b"gasday,quantity\n").unwrap();
        let out = normalize(&raw, &FLOWS_SCHEMA);
        assert_eq!(out.table.status, TableStatus::Empty);
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        for s in ["2025-08-01", "2025/08/01", "01/08/2025", "01 Aug 2025", "2025/08/01 00:00:00", "2025-08-01T06:00:00"] {
            assert_eq!(parse_date(s), Some(d), "{s}");
        }
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("1,250.5"), Some(1250.5));
        assert_eq!(parse_quantity("0"), Some(0.0));
        assert_eq!(parse_quantity("-3"), None);
        assert_eq!(parse_quantity("NaN"), None);
        assert_eq!(parse_quantity("n/a"), None);
        assert_eq!(parse_signed_quantity("-1,000"), Some(-1000.0));
        assert_eq!(parse_signed_quantity("inf"), None);
    }
}
