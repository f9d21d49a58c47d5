//! Listing search.
//!
//! This module turns free-text queries into structured rows scraped from a
//! rutor-style tracker. A `ListingSource` fetches and parses result pages,
//! `ListingCache` memoizes them per query for a fixed TTL, and
//! `ListingResolver` ties the two together.

mod cache;
mod parser;
mod resolver;
mod rutor;
mod types;

pub use cache::ListingCache;
pub use parser::parse_listing_page;
pub use resolver::ListingResolver;
pub use rutor::RutorSource;
pub use types::*;
