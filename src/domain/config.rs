//! Pipeline configuration.
//!
//! Built from CLI flags (which in turn fall back to `GASB_*` environment
//! variables and `.env`), plus defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

pub const DEFAULT_BASE_URL: &str = "https://nemweb.com.au/Reports/Current/GBB/";
pub const DEFAULT_CACHE_DIR: &str = "data_cache";
pub const DEFAULT_TIMEOUT_SECS: u64 = 40;
pub const DEFAULT_MAX_AGE_HOURS: u64 = 24;
pub const DEFAULT_HORIZON_DAYS: u32 = 30;
pub const DEFAULT_MEMO_SECS: u64 = 3600;
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 400;

/// Everything a pipeline run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upstream base URL; the source file name is appended.
    pub base_url: String,
    pub cache_dir: PathBuf,
    /// Upper bound on a single network fetch.
    pub timeout: Duration,
    /// Cached blobs at least this old are refetched.
    pub max_age: Duration,
    /// Days covered by the flat nameplate projection.
    pub horizon_days: u32,
    /// First day of the nameplate projection.
    pub today: NaiveDate,
    /// Facility class kept by the facility filter.
    pub facility_class: String,
    pub demand_zone_type: String,
    pub demand_zone_name: String,
    /// Cap on how many days a single outlook date range expands into.
    pub max_range_days: u32,
}

impl PipelineConfig {
    pub fn url_for(&self, file_name: &str) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{file_name}", self.base_url)
        } else {
            format!("{}/{file_name}", self.base_url)
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_HOURS * 3600),
            horizon_days: DEFAULT_HORIZON_DAYS,
            today: chrono::Local::now().date_naive(),
            facility_class: "production".to_string(),
            demand_zone_type: "demand".to_string(),
            demand_zone_name: "whole wa".to_string(),
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_joins_with_single_slash() {
        let mut config = PipelineConfig::default();
        assert_eq!(
            config.url_for("a.csv"),
            "https://nemweb.com.au/Reports/Current/GBB/a.csv"
        );
        config.base_url = "http://localhost:8080/gbb".to_string();
        assert_eq!(config.url_for("a.csv"), "http://localhost:8080/gbb/a.csv");
    }
}
