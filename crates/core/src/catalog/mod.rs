//! Listing catalog - a persistent record of every row seen in search results.
//!
//! Rows are stored by content hash when a search completes, so a hash can be
//! mapped back to its magnet pointer later without repeating the search.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalog;
pub use types::*;

use crate::listing::ListingRow;

/// Trait for listing catalog storage.
pub trait ListingCatalog: Send + Sync {
    /// Store search results in the catalog.
    ///
    /// Rows without a content hash are skipped. Known hashes are refreshed
    /// (latest row wins, seen_count/last_seen_at updated).
    ///
    /// Returns the number of new hashes added (not updates).
    fn store(&self, rows: &[ListingRow]) -> Result<u32, CatalogError>;

    /// Get the entry for a content hash (case-insensitive).
    fn get(&self, content_hash: &str) -> Result<CatalogEntry, CatalogError>;

    /// Number of distinct hashes held.
    fn count(&self) -> Result<u64, CatalogError>;

    /// Remove every entry.
    fn clear(&self) -> Result<(), CatalogError>;
}
