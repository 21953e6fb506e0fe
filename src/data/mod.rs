//! Source ingestion: blob cache, CSV reader, schema normalization, filtering, dedup.

pub mod aggregate;
pub mod cache;
pub mod filter;
pub mod reader;
pub mod schema;

pub use aggregate::dedup_capacity;
pub use cache::{BlobCache, Fetch, HttpFetcher};
pub use reader::{RawRecord, RawTable, SourceReader};
pub use schema::{Field, Normalized, NormalizedRow, SchemaMap};
