//! Prometheus metrics for observability.
//!
//! HTTP request metrics are recorded by the middleware; listing and streaming
//! metrics come from the core crate. Cache and catalog sizes are gauges
//! refreshed from application state on each scrape.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
///
/// For `/stream` this covers the time to the response head, not the body.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "streamgate_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("streamgate_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamgate_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// State Metrics (collected dynamically)
// =============================================================================

/// Queries currently held in the listing cache.
pub static LISTING_CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamgate_listing_cache_entries",
        "Number of queries held in the listing cache",
    )
    .unwrap()
});

/// Rows recorded in the listing catalog.
pub static CATALOG_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamgate_catalog_entries",
        "Number of entries in the listing catalog",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // State
    registry
        .register(Box::new(LISTING_CACHE_ENTRIES.clone()))
        .unwrap();
    registry
        .register(Box::new(CATALOG_ENTRIES.clone()))
        .unwrap();

    // Core metrics (listing, content handles, streams)
    for metric in streamgate_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Refresh gauges that mirror application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    LISTING_CACHE_ENTRIES.set(state.resolver().cache().len() as i64);

    if let Some(catalog) = state.catalog() {
        match catalog.count() {
            Ok(count) => CATALOG_ENTRIES.set(count as i64),
            Err(e) => warn!(error = %e, "Failed to count catalog entries"),
        }
    }
}

/// Normalize a path for metric labels (replace hashes with placeholders).
pub fn normalize_path(path: &str) -> String {
    static HASH_PATTERN: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"[0-9a-fA-F]{40}").unwrap());
    static NUMERIC_PATTERN: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    let result = HASH_PATTERN.replace_all(path, "{hash}");
    let result = NUMERIC_PATTERN.replace_all(&result, "/{id}$1");
    result.to_string()
}
