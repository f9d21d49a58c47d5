//! Mock listing source for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::listing::{ListingError, ListingRow, ListingSource};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    /// The query that was fetched.
    pub query: String,
    /// The row limit passed by the caller.
    pub max_results: usize,
    /// When the fetch was made.
    pub timestamp: Instant,
}

/// Mock implementation of the ListingSource trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable rows per query
/// - Track fetches for assertions
/// - Simulate failures and slow responses
///
/// Queries without configured rows return an empty result page.
#[derive(Debug)]
pub struct MockListingSource {
    /// Configured rows per query.
    rows: Arc<RwLock<HashMap<String, Vec<ListingRow>>>>,
    /// Recorded fetches.
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    /// If set, the next fetch will fail with this error.
    next_error: Arc<RwLock<Option<ListingError>>>,
    /// Simulated network latency.
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockListingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockListingSource {
    /// Create a new mock source with no rows.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            fetches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the rows returned for `query`.
    pub async fn set_rows(&self, query: &str, rows: Vec<ListingRow>) {
        self.rows.write().await.insert(query.to_string(), rows);
    }

    /// Get recorded fetches.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Queries fetched so far, in order.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.fetches
            .read()
            .await
            .iter()
            .map(|f| f.query.clone())
            .collect()
    }

    /// Get the number of fetches performed.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: ListingError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every fetch by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<ListingError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ListingRow>, ListingError> {
        self.fetches.write().await.push(RecordedFetch {
            query: query.to_string(),
            max_results,
            timestamp: Instant::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let rows = self
            .rows
            .read()
            .await
            .get(query)
            .cloned()
            .unwrap_or_default();

        Ok(rows.into_iter().take(max_results).collect())
    }
}
