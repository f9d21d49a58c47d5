//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the listing source and
//! content engine traits, so the resolver, registry, gateway and HTTP layer
//! can be exercised without a tracker or a swarm.
//!
//! # Example
//!
//! ```rust,ignore
//! use streamgate_core::testing::{fixtures, MockContentEngine, MockListingSource};
//!
//! let source = MockListingSource::new();
//! source.set_rows("dune", vec![fixtures::listing_row("Dune", HASH)]).await;
//!
//! let engine = MockContentEngine::new();
//! engine.add_content(HASH, vec![ContentFile::new("dune.mkv", 4096)]).await;
//! ```

mod mock_content_engine;
mod mock_listing_source;

pub use mock_content_engine::{MockContentEngine, RecordedRead};
pub use mock_listing_source::{MockListingSource, RecordedFetch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::listing::ListingRow;

    /// Magnet URI for an info hash.
    pub fn magnet(info_hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{}&dn=fixture", info_hash)
    }

    /// Create a listing row with reasonable defaults and a magnet for `info_hash`.
    pub fn listing_row(title: &str, info_hash: &str) -> ListingRow {
        let slug = title.to_lowercase().replace(' ', "-");
        ListingRow::new(title, format!("https://rutor.info/torrent/1/{}", slug))
            .with_date("01 Янв 24")
            .with_download_url(Some("https://d.rutor.info/download/1".to_string()))
            .with_pointer(Some(magnet(info_hash)))
            .with_size("1.37 GB")
            .with_peers(25, 3)
    }

    /// A listing row that has no magnet link.
    pub fn listing_row_without_magnet(title: &str) -> ListingRow {
        listing_row(title, "").with_pointer(None)
    }
}
