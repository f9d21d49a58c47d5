//! Types for the listing catalog.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::listing::ListingRow;

/// A stored row plus bookkeeping about when it was seen.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub row: ListingRow,
    /// When the hash first appeared in a search.
    pub first_seen_at: DateTime<Utc>,
    /// When the hash last appeared in a search.
    pub last_seen_at: DateTime<Utc>,
    /// Number of searches the hash appeared in.
    pub seen_count: u32,
}

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
