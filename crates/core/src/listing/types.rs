//! Types for the listing search system.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use thiserror::Error;

static BTIH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)btih:([0-9a-f]{40})").expect("btih pattern is valid"));

/// Extract the lowercase 40-hex info hash following `btih:` in a magnet URI.
pub fn extract_info_hash(pointer: &str) -> Option<String> {
    BTIH_PATTERN
        .captures(pointer)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// One parsed search result.
///
/// Rows are immutable once built: fields are private and the `with_*`
/// methods consume the row. `content_hash` is always derived from the
/// magnet pointer, so it is either empty or 40 lowercase hex characters.
///
/// The JSON field names are the public wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    date: String,
    title: String,
    #[serde(rename = "torrentPage")]
    page_url: String,
    #[serde(rename = "downloadLink", skip_serializing_if = "Option::is_none")]
    download_url: Option<String>,
    #[serde(rename = "magnetLink", skip_serializing_if = "Option::is_none")]
    content_pointer: Option<String>,
    size: String,
    seeders: u32,
    leechers: u32,
    #[serde(rename = "infoHash")]
    content_hash: String,
}

impl ListingRow {
    /// Start a row with its title and absolute page URL.
    pub fn new(title: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            date: String::new(),
            title: title.into(),
            page_url: page_url.into(),
            download_url: None,
            content_pointer: None,
            size: String::new(),
            seeders: 0,
            leechers: 0,
            content_hash: String::new(),
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.download_url = url;
        self
    }

    /// Set the magnet pointer and re-derive the content hash from it.
    pub fn with_pointer(mut self, pointer: Option<String>) -> Self {
        self.content_hash = pointer
            .as_deref()
            .and_then(extract_info_hash)
            .unwrap_or_default();
        self.content_pointer = pointer;
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_peers(mut self, seeders: u32, leechers: u32) -> Self {
        self.seeders = seeders;
        self.leechers = leechers;
        self
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    pub fn content_pointer(&self) -> Option<&str> {
        self.content_pointer.as_deref()
    }

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn seeders(&self) -> u32 {
        self.seeders
    }

    pub fn leechers(&self) -> u32 {
        self.leechers
    }

    /// Lowercase 40-hex info hash, or empty when the row has no usable pointer.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Whether this row carries the given hash (case-insensitive).
    pub fn matches_hash(&self, hash: &str) -> bool {
        !self.content_hash.is_empty() && self.content_hash.eq_ignore_ascii_case(hash)
    }
}

/// Errors that can occur while resolving listings.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Listing source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to parse listing page: {0}")]
    Parse(String),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

/// Trait for remote listing backends.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Fetch and parse the result page for `query`, keeping at most
    /// `max_results` rows in document order.
    async fn fetch(&self, query: &str, max_results: usize)
        -> Result<Vec<ListingRow>, ListingError>;
}
