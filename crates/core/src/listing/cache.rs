//! Time-bounded memoization of parsed search results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};
use tracing::debug;

use super::ListingRow;

struct CacheEntry {
    rows: Vec<ListingRow>,
    generation: u64,
    expires_at: Instant,
    expiry_timer: AbortHandle,
}

struct CacheInner {
    entries: Mutex<HashMap<String, CacheEntry>>,
    next_generation: AtomicU64,
}

impl CacheInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the entry for `query` only if it still belongs to `generation`.
    fn expire(&self, query: &str, generation: u64) -> bool {
        let mut entries = self.entries();
        if entries.get(query).map(|e| e.generation) != Some(generation) {
            return false;
        }
        entries.remove(query);
        true
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        for entry in self.entries().values() {
            entry.expiry_timer.abort();
        }
    }
}

/// Query-keyed cache of listing rows with a fixed time-to-live.
///
/// Capacity is bounded only by time. Each insert schedules a timer that
/// removes exactly that fetch generation, so an older timer never deletes
/// a newer entry for the same query. Lookups also check the expiry instant.
///
/// Time is read from `tokio::time`, so tests can drive expiry with a paused
/// clock.
#[derive(Clone)]
pub struct ListingCache {
    ttl: Duration,
    inner: Arc<CacheInner>,
}

impl ListingCache {
    /// Create a cache whose entries live for `ttl`. A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// A pass-through cache: every lookup misses and inserts are dropped.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached rows for `query` if present and not expired.
    pub fn get(&self, query: &str) -> Option<Vec<ListingRow>> {
        let mut entries = self.inner.entries();
        let expires_at = entries.get(query)?.expires_at;

        if expires_at > Instant::now() {
            return entries.get(query).map(|e| e.rows.clone());
        }

        if let Some(stale) = entries.remove(query) {
            stale.expiry_timer.abort();
        }
        None
    }

    /// Store rows for `query`, replacing any previous entry.
    ///
    /// Must be called from within a tokio runtime (the expiry timer is a task).
    pub fn insert(&self, query: &str, rows: Vec<ListingRow>) {
        if !self.is_enabled() {
            return;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let expires_at = Instant::now() + self.ttl;

        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let key = query.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            if let Some(inner) = weak.upgrade() {
                if inner.expire(&key, generation) {
                    debug!(query = %key, generation, "Listing cache entry expired");
                }
            }
        });

        let entry = CacheEntry {
            rows,
            generation,
            expires_at,
            expiry_timer: timer.abort_handle(),
        };

        if let Some(previous) = self.inner.entries().insert(query.to_string(), entry) {
            previous.expiry_timer.abort();
        }
    }

    /// Number of entries currently held (expired entries may linger until
    /// their timer runs or they are looked up).
    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn generation_of(&self, query: &str) -> Option<u64> {
        self.inner.entries().get(query).map(|e| e.generation)
    }
}
