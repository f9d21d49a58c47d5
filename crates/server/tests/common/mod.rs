#![allow(dead_code)]

//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without a tracker
//! or a swarm.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use streamgate_core::{
    testing::{MockContentEngine, MockListingSource},
    CatalogConfig, Config, ContentHandleRegistry, ContentTypeMode, ListingCache, ListingCatalog,
    ListingResolver, ServerConfig, SqliteCatalog, StreamingConfig, StreamingGateway,
};

/// Re-export fixtures for test convenience
pub use streamgate_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Listing pages (MockListingSource)
/// - Content sessions and range reads (MockContentEngine)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new().await;
///     fixture.source.set_rows("dune", vec![fixtures::listing_row("Dune", HASH)]).await;
///
///     let response = fixture.get("/search?q=dune").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock listing source - configure rows per query
    pub source: Arc<MockListingSource>,
    /// Mock content engine - control readiness, files and reads
    pub engine: Arc<MockContentEngine>,
    /// Handle registry, absent when the engine is disabled
    pub registry: Option<Arc<ContentHandleRegistry>>,
    /// In-memory listing catalog, absent when disabled
    pub catalog: Option<Arc<SqliteCatalog>>,
}

/// Response from a JSON test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from a streaming test request, body kept as raw bytes
#[derive(Debug)]
pub struct StreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl StreamResponse {
    /// Header value as a string, empty if absent.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// The body parsed as JSON (error responses).
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let source = Arc::new(MockListingSource::new());
        let engine = Arc::new(MockContentEngine::new());

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            catalog: CatalogConfig {
                enabled: !test_config.disable_catalog,
                ..Default::default()
            },
            streaming: StreamingConfig {
                content_type: test_config.content_type,
            },
            ..Default::default()
        };

        let catalog = (!test_config.disable_catalog)
            .then(|| Arc::new(SqliteCatalog::in_memory().expect("Failed to create catalog")));

        let mut resolver = ListingResolver::new(
            Arc::clone(&source) as Arc<dyn streamgate_core::ListingSource>,
            ListingCache::new(Duration::from_secs(600)),
            config.listing.max_results,
        )
        .with_single_flight(true);
        if let Some(catalog) = &catalog {
            resolver = resolver.with_catalog(Arc::clone(catalog) as Arc<dyn ListingCatalog>);
        }
        let resolver = Arc::new(resolver);

        let registry = (!test_config.disable_engine).then(|| {
            Arc::new(ContentHandleRegistry::new(
                Arc::clone(&engine) as Arc<dyn streamgate_core::ContentEngine>
            ))
        });

        let gateway = StreamingGateway::new(Arc::clone(&resolver), registry.clone())
            .with_ready_timeout(test_config.ready_timeout)
            .with_content_type(test_config.content_type);

        let state = Arc::new(streamgate_server::state::AppState::new(
            config,
            resolver,
            Arc::new(gateway),
            catalog
                .clone()
                .map(|c| c as Arc<dyn ListingCatalog>),
        ));

        let router = streamgate_server::api::create_router(state);

        Self {
            router,
            source,
            engine,
            registry,
            catalog,
        }
    }

    /// Send a GET request and parse the JSON body.
    pub async fn get(&self, path: &str) -> TestResponse {
        let response = self.get_raw(path, None).await;
        let body = if response.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&response.body).unwrap_or(Value::Null)
        };

        TestResponse {
            status: response.status,
            body,
        }
    }

    /// Send a GET request with an optional `Range` header and collect the raw body.
    pub async fn get_range(&self, path: &str, range: &str) -> StreamResponse {
        self.get_raw(path, Some(range)).await
    }

    /// Send a GET request and collect headers and the raw body.
    pub async fn get_raw(&self, path: &str, range: Option<&str>) -> StreamResponse {
        let mut request_builder = Request::builder().method("GET").uri(path);
        if let Some(range) = range {
            request_builder = request_builder.header("Range", range);
        }

        let request = request_builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        StreamResponse {
            status,
            headers,
            body,
        }
    }

    /// Number of live content handles.
    pub fn handle_count(&self) -> usize {
        self.registry.as_ref().map(|r| r.len()).unwrap_or(0)
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Run without a listing catalog (hash-only lookups need `q`)
    pub disable_catalog: bool,
    /// Run without a content engine
    pub disable_engine: bool,
    /// Content-Type selection for streamed files
    pub content_type: ContentTypeMode,
    /// Readiness deadline for content handles
    pub ready_timeout: Option<Duration>,
}

impl TestConfig {
    /// Create config without the listing catalog.
    pub fn without_catalog() -> Self {
        Self {
            disable_catalog: true,
            ..Default::default()
        }
    }

    /// Create config without a content engine.
    pub fn without_engine() -> Self {
        Self {
            disable_engine: true,
            ..Default::default()
        }
    }
}
