//! Query → rows resolution through the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, ListingCatalog};
use crate::metrics::LISTING_CACHE_LOOKUPS;

use super::{ListingCache, ListingError, ListingRow, ListingSource};

type InflightMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// A caller's place in the single-flight queue for one query.
///
/// Dropping it, on completion or when the request is cancelled, removes the
/// query's entry once no other caller holds it.
struct InflightGate<'a> {
    map: &'a InflightMap,
    query: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InflightGate<'a> {
    fn join(map: &'a InflightMap, query: &'a str) -> Self {
        let lock = map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(query.to_string())
            .or_default()
            .clone();
        Self { map, query, lock }
    }
}

impl Drop for InflightGate<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // Gates are cloned only under this lock; the map and this guard are
        // the last two holders when nobody else is queued.
        if map
            .get(self.query)
            .is_some_and(|g| Arc::ptr_eq(g, &self.lock) && Arc::strong_count(g) == 2)
        {
            map.remove(self.query);
        }
    }
}

/// Turns free-text queries into listing rows.
///
/// Fresh results are cached for the cache's TTL and, when a catalog is
/// attached, recorded by content hash so they can be found again without
/// a query.
pub struct ListingResolver {
    source: Arc<dyn ListingSource>,
    cache: ListingCache,
    catalog: Option<Arc<dyn ListingCatalog>>,
    max_results: usize,
    inflight: Option<InflightMap>,
}

impl ListingResolver {
    pub fn new(source: Arc<dyn ListingSource>, cache: ListingCache, max_results: usize) -> Self {
        Self {
            source,
            cache,
            catalog: None,
            max_results,
            inflight: None,
        }
    }

    /// Record fresh rows in `catalog` and use it for hash-only lookups.
    pub fn with_catalog(mut self, catalog: Arc<dyn ListingCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Coalesce concurrent cache misses for the same query into one fetch.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.inflight = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    pub fn has_catalog(&self) -> bool {
        self.catalog.is_some()
    }

    /// Rows for `query` in document order, from cache when fresh.
    ///
    /// The query is trimmed before use; a blank query is rejected.
    pub async fn resolve(&self, query: &str) -> Result<Vec<ListingRow>, ListingError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ListingError::EmptyQuery);
        }

        if let Some(rows) = self.cached(query) {
            return Ok(rows);
        }

        match &self.inflight {
            Some(inflight) => self.fetch_single_flight(inflight, query).await,
            None => self.fetch_fresh(query).await,
        }
    }

    /// First row for `query` whose content hash equals `hash` (case-insensitive).
    pub async fn find_by_hash(
        &self,
        query: &str,
        hash: &str,
    ) -> Result<Option<ListingRow>, ListingError> {
        let rows = self.resolve(query).await?;
        Ok(rows.into_iter().find(|row| row.matches_hash(hash)))
    }

    /// Row previously recorded in the catalog for `hash`.
    ///
    /// Returns `None` when no catalog is attached or the hash was never seen.
    pub fn find_known(&self, hash: &str) -> Result<Option<ListingRow>, ListingError> {
        let Some(catalog) = &self.catalog else {
            return Ok(None);
        };

        match catalog.get(hash) {
            Ok(entry) => Ok(Some(entry.row)),
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(e) => Err(ListingError::Catalog(e.to_string())),
        }
    }

    fn cached(&self, query: &str) -> Option<Vec<ListingRow>> {
        if !self.cache.is_enabled() {
            return None;
        }

        let hit = self.cache.get(query);
        let result = if hit.is_some() { "hit" } else { "miss" };
        LISTING_CACHE_LOOKUPS.with_label_values(&[result]).inc();
        if hit.is_some() {
            debug!(query = %query, "Listing cache hit");
        }
        hit
    }

    async fn fetch_single_flight(
        &self,
        inflight: &InflightMap,
        query: &str,
    ) -> Result<Vec<ListingRow>, ListingError> {
        let gate = InflightGate::join(inflight, query);
        let _turn = gate.lock.lock().await;

        // Another caller may have filled the cache while we waited.
        match self.cache.get(query) {
            Some(rows) => Ok(rows),
            None => self.fetch_fresh(query).await,
        }
    }

    async fn fetch_fresh(&self, query: &str) -> Result<Vec<ListingRow>, ListingError> {
        let rows = match self.source.fetch(query, self.max_results).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(source = self.source.name(), query = %query, error = %e, "Listing fetch failed");
                return Err(e);
            }
        };

        info!(
            source = self.source.name(),
            query = %query,
            rows = rows.len(),
            "Fetched listing"
        );

        self.cache.insert(query, rows.clone());
        self.record(&rows);

        Ok(rows)
    }

    fn record(&self, rows: &[ListingRow]) {
        let Some(catalog) = &self.catalog else {
            return;
        };

        match catalog.store(rows) {
            Ok(new_count) if new_count > 0 => {
                debug!(new = new_count, "Recorded listing rows in catalog");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to record listing rows in catalog"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::testing::{fixtures, MockListingSource};
    use std::time::Duration;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn resolver_with(source: Arc<MockListingSource>, ttl_secs: u64) -> ListingResolver {
        ListingResolver::new(source, ListingCache::new(Duration::from_secs(ttl_secs)), 50)
    }

    #[tokio::test]
    async fn test_empty_query_rejected_without_fetch() {
        let source = Arc::new(MockListingSource::new());
        let resolver = resolver_with(source.clone(), 600);

        assert!(matches!(resolver.resolve("").await, Err(ListingError::EmptyQuery)));
        assert!(matches!(resolver.resolve("   ").await, Err(ListingError::EmptyQuery)));
        assert_eq!(source.fetch_count().await, 0);
    }

    #[tokio::test]
    async fn test_second_resolve_served_from_cache() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_rows("dune", vec![fixtures::listing_row("Dune", HASH_A)])
            .await;
        let resolver = resolver_with(source.clone(), 600);

        let first = resolver.resolve("dune").await.unwrap();
        let second = resolver.resolve("dune").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.fetch_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_ttl() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_rows("dune", vec![fixtures::listing_row("Dune", HASH_A)])
            .await;
        let resolver = resolver_with(source.clone(), 600);

        resolver.resolve("dune").await.unwrap();
        tokio::time::advance(Duration::from_secs(601)).await;
        resolver.resolve("dune").await.unwrap();

        assert_eq!(source.fetch_count().await, 2);
    }

    #[tokio::test]
    async fn test_query_is_trimmed_for_cache_key() {
        let source = Arc::new(MockListingSource::new());
        let resolver = resolver_with(source.clone(), 600);

        resolver.resolve("dune").await.unwrap();
        resolver.resolve("  dune ").await.unwrap();

        assert_eq!(source.fetch_count().await, 1);
        assert_eq!(source.recorded_queries().await, vec!["dune".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_next_error(ListingError::SourceUnavailable("HTTP 503".into()))
            .await;
        let resolver = resolver_with(source.clone(), 600);

        let result = resolver.resolve("dune").await;
        assert!(matches!(result, Err(ListingError::SourceUnavailable(_))));
        assert!(resolver.cache().is_empty());

        resolver.resolve("dune").await.unwrap();
        assert_eq!(source.fetch_count().await, 2);
    }

    #[tokio::test]
    async fn test_disabled_cache_fetches_every_time() {
        let source = Arc::new(MockListingSource::new());
        let resolver = ListingResolver::new(source.clone(), ListingCache::disabled(), 50);

        resolver.resolve("dune").await.unwrap();
        resolver.resolve("dune").await.unwrap();

        assert_eq!(source.fetch_count().await, 2);
    }

    #[tokio::test]
    async fn test_max_results_passed_to_source() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_rows(
                "many",
                (0..5)
                    .map(|i| fixtures::listing_row(&format!("Row {}", i), HASH_A))
                    .collect(),
            )
            .await;
        let resolver = ListingResolver::new(
            source.clone(),
            ListingCache::new(Duration::from_secs(600)),
            2,
        );

        let rows = resolver.resolve("many").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_hash_is_case_insensitive() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_rows(
                "dune",
                vec![
                    fixtures::listing_row("Dune Part One", HASH_A),
                    fixtures::listing_row("Dune Part Two", HASH_B),
                ],
            )
            .await;
        let resolver = resolver_with(source, 600);

        let row = resolver
            .find_by_hash("dune", &HASH_B.to_uppercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.title(), "Dune Part Two");

        let missing = resolver
            .find_by_hash("dune", "cccccccccccccccccccccccccccccccccccccccc")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_fresh_rows_recorded_in_catalog() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_rows("dune", vec![fixtures::listing_row("Dune", HASH_A)])
            .await;
        let catalog = Arc::new(SqliteCatalog::in_memory().unwrap());
        let resolver = resolver_with(source, 600).with_catalog(catalog.clone());

        assert!(resolver.find_known(HASH_A).unwrap().is_none());
        resolver.resolve("dune").await.unwrap();

        let known = resolver.find_known(HASH_A).unwrap().unwrap();
        assert_eq!(known.title(), "Dune");
        assert_eq!(catalog.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_known_without_catalog() {
        let resolver = resolver_with(Arc::new(MockListingSource::new()), 600);
        assert!(!resolver.has_catalog());
        assert!(resolver.find_known(HASH_A).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_flight_coalesces_concurrent_misses() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_rows("dune", vec![fixtures::listing_row("Dune", HASH_A)])
            .await;
        source.set_delay(Duration::from_millis(50)).await;
        let resolver = Arc::new(resolver_with(source.clone(), 600).with_single_flight(true));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve("dune").await })
            })
            .collect();

        for task in tasks {
            let rows = task.await.unwrap().unwrap();
            assert_eq!(rows.len(), 1);
        }

        assert_eq!(source.fetch_count().await, 1);
        let inflight = resolver.inflight.as_ref().unwrap();
        assert!(inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_leave_no_gates() {
        let source = Arc::new(MockListingSource::new());
        source.set_delay(Duration::from_millis(200)).await;
        let resolver = Arc::new(resolver_with(source.clone(), 600).with_single_flight(true));

        let tasks: Vec<_> = (0..100)
            .map(|i| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(&format!("query {}", i)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(1)).await;
        for task in tasks {
            task.abort();
            let _ = task.await;
        }

        let inflight = resolver.inflight.as_ref().unwrap();
        assert!(inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_keeps_gate_for_leader() {
        let source = Arc::new(MockListingSource::new());
        source
            .set_rows("dune", vec![fixtures::listing_row("Dune", HASH_A)])
            .await;
        source.set_delay(Duration::from_millis(50)).await;
        let resolver = Arc::new(resolver_with(source.clone(), 600).with_single_flight(true));

        let leader = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve("dune").await })
        };
        let waiter = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve("dune").await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        let _ = waiter.await;

        let rows = leader.await.unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(source.fetch_count().await, 1);
        assert!(resolver.inflight.as_ref().unwrap().lock().unwrap().is_empty());
    }
}
