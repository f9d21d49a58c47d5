//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Listing resolution (cache lookups, remote fetches)
//! - Content handles held by the registry
//! - Streaming outcomes and bytes served

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Listing
// =============================================================================

/// Listing cache lookups by result.
pub static LISTING_CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamgate_listing_cache_lookups_total",
            "Listing cache lookups",
        ),
        &["result"], // "hit", "miss"
    )
    .unwrap()
});

/// Remote listing fetch duration in seconds.
pub static LISTING_FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "streamgate_listing_fetch_duration_seconds",
            "Duration of remote listing fetch and parse",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"], // "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Content handles
// =============================================================================

/// Content handles currently registered.
pub static CONTENT_HANDLES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamgate_content_handles_active",
        "Content handles currently held by the registry",
    )
    .unwrap()
});

// =============================================================================
// Streaming
// =============================================================================

/// Streams finished by outcome.
pub static STREAMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("streamgate_streams_total", "Byte-range streams finished"),
        &["outcome"], // "completed", "aborted"
    )
    .unwrap()
});

/// Bytes written to stream response bodies.
pub static STREAM_BYTES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "streamgate_stream_bytes_total",
        "Total bytes delivered in stream bodies",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Listing
        Box::new(LISTING_CACHE_LOOKUPS.clone()),
        Box::new(LISTING_FETCH_DURATION.clone()),
        // Content handles
        Box::new(CONTENT_HANDLES_ACTIVE.clone()),
        // Streaming
        Box::new(STREAMS_TOTAL.clone()),
        Box::new(STREAM_BYTES_TOTAL.clone()),
    ]
}
