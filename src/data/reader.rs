//! Turn cached CSV bytes into a raw, schema-less table.
//!
//! Headers are lower-cased (and stripped of a UTF-8 BOM) so downstream column
//! matching is case-insensitive. An unavailable source yields an empty table
//! flagged as unavailable; it never aborts the run.

use std::collections::HashMap;

use csv::StringRecord;
use tracing::{debug, warn};

use super::cache::{BlobCache, Fetch};
use crate::domain::SourceKey;

/// Rows of one source, with no fixed schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Lower-cased column names, in file order.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// `false` when the source could not be fetched or parsed at all.
    pub available: bool,
}

/// One row of raw values, addressed by column index.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    values: &'a [String],
}

impl<'a> RawRecord<'a> {
    /// Trimmed value at `idx`; empty cells and short rows read as absent.
    pub fn value_at(&self, idx: usize) -> Option<&'a str> {
        self.values.get(idx).map(String::as_str).map(str::trim).filter(|s| !s.is_empty())
    }
}

impl RawTable {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.rows.iter().map(|values| RawRecord { values })
    }

    /// Column name to index, for the stages that resolve columns once up front.
    pub fn header_map(&self) -> HashMap<&str, usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_str(), idx))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse CSV bytes. Malformed rows are skipped; an unreadable header fails.
pub fn parse_csv(bytes: &[u8]) -> Result<RawTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()?
        .iter()
        .map(normalize_header_name)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        match result {
            Ok(record) => rows.push(record_values(&record)),
            Err(e) => {
                skipped += 1;
                debug!(error = %e, "skipping malformed CSV row");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "skipped malformed CSV rows");
    }

    Ok(RawTable {
        headers,
        rows,
        available: true,
    })
}

fn record_values(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel-style exports may prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_lowercase()
}

/// Reads sources through the blob cache.
pub struct SourceReader<F> {
    cache: BlobCache<F>,
}

impl<F: Fetch> SourceReader<F> {
    pub fn new(cache: BlobCache<F>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &BlobCache<F> {
        &self.cache
    }

    /// Read one source; any fetch or parse failure degrades to an unavailable table.
    pub fn read(&self, key: SourceKey, force: bool) -> RawTable {
        let bytes = match self.cache.fetch(key, force) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(source = %key, error = %err, "reading source as empty");
                return RawTable::unavailable();
            }
        };

        match parse_csv(&bytes) {
            Ok(table) => {
                debug!(source = %key, rows = table.len(), columns = table.headers.len(), "source read");
                table
            }
            Err(e) => {
                warn!(source = %key, error = %e, "failed to parse CSV, reading source as empty");
                RawTable::unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_lowercased_and_bom_stripped() {
        let table = parse_csv("\u{feff}FacilityName, FacilityType ,GasDay\nAlpha,Production,2025-08-01\n".as_bytes())
            .unwrap();
        assert_eq!(table.headers, vec!["facilityname", "facilitytype", "gasday"]);
        assert!(table.available);

        let rec = table.records().next().unwrap();
        assert_eq!(rec.value_at(1), Some("Production"));
    }

    #[test]
    fn empty_cells_read_as_absent_and_short_rows_are_kept() {
        let table = parse_csv(b"a,b,c\n1,,3\n4\n").unwrap();
        assert_eq!(table.len(), 2);
        let rows: Vec<_> = table.records().collect();
        assert_eq!(rows[0].value_at(0), Some("1"));
        assert_eq!(rows[0].value_at(1), None);
        assert_eq!(rows[0].value_at(2), Some("3"));
        assert_eq!(rows[1].value_at(2), None);
    }

    #[test]
    fn unavailable_table_is_empty() {
        let table = RawTable::unavailable();
        assert!(table.is_empty());
        assert!(!table.available);
    }
}
