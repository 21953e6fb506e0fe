//! On-disk blob cache for upstream bulletin files.
//!
//! Each source is stored under its published file name, byte-for-byte as
//! served. A cached copy is reused until it is `max_age` old; `force` bypasses
//! the age check entirely.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::domain::{PipelineConfig, SourceKey};
use crate::error::{AppError, SourceError};

/// Retrieves raw bytes for a URL.
///
/// Implementations must return within a bounded time.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Blocking HTTP fetcher with a hard request timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                format!("request timed out: {e}")
            } else {
                format!("request failed: {e}")
            }
        })?;

        if !resp.status().is_success() {
            return Err(format!("request failed with status {}", resp.status()));
        }

        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| format!("failed to read response body: {e}"))
    }
}

/// Keyed byte store with a time-based staleness rule.
pub struct BlobCache<F> {
    dir: PathBuf,
    base_url: String,
    max_age: Duration,
    fetcher: F,
}

impl<F: Fetch> BlobCache<F> {
    pub fn new(config: &PipelineConfig, fetcher: F) -> Self {
        Self {
            dir: config.cache_dir.clone(),
            base_url: config.url_for(""),
            max_age: config.max_age,
            fetcher,
        }
    }

    pub fn path_for(&self, key: SourceKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Return the bytes for `key`, refetching when missing, stale, or forced.
    pub fn fetch(&self, key: SourceKey, force: bool) -> Result<Vec<u8>, SourceError> {
        let path = self.path_for(key);

        if !force && !is_stale(modified_time(&path), SystemTime::now(), self.max_age) {
            match fs::read(&path) {
                Ok(bytes) => {
                    debug!(source = %key, path = %path.display(), bytes = bytes.len(), "cache hit");
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(source = %key, error = %e, "cached copy unreadable, refetching");
                }
            }
        }

        self.refresh(key, &path, force)
    }

    fn refresh(&self, key: SourceKey, path: &Path, force: bool) -> Result<Vec<u8>, SourceError> {
        let url = format!("{}{}", self.base_url, key.file_name());
        info!(source = %key, %url, force, "fetching source");

        let bytes = match self
            .fetcher
            .fetch(&url)
            .and_then(|bytes| validate_payload(&bytes).map(|()| bytes))
        {
            Ok(bytes) => bytes,
            Err(reason) => {
                remove_partial(path);
                warn!(source = %key, %reason, "source unavailable");
                return Err(SourceError::unavailable(key, reason));
            }
        };

        if let Err(source) = write_atomic(path, &bytes) {
            remove_partial(path);
            return Err(SourceError::Storage { key, source });
        }

        info!(source = %key, bytes = bytes.len(), "cache refreshed");
        Ok(bytes)
    }
}

/// A missing copy is stale; a copy with a future timestamp is fresh.
pub fn is_stale(modified: Option<SystemTime>, now: SystemTime, max_age: Duration) -> bool {
    let Some(modified) = modified else {
        return true;
    };
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    age >= max_age
}

/// Reject payloads that are not tabular text (empty bodies, HTML error pages).
pub fn validate_payload(bytes: &[u8]) -> Result<(), String> {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start().to_ascii_lowercase();

    if text.is_empty() {
        return Err("empty payload".to_string());
    }
    if text.starts_with("<!doctype html") || text.starts_with("<html") {
        return Err("payload is an HTML page, not CSV data".to_string());
    }
    Ok(())
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Write to a sibling `.part` file, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = part_path(path);
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)
}

fn remove_partial(path: &Path) {
    let tmp = part_path(path);
    if tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %e, "failed to remove partial cache entry");
        }
    }
}
