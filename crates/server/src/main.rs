use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamgate_core::{
    load_config, validate_config, Config, ContentEngine, ContentHandleRegistry, EngineBackend,
    LibrqbitEngine, ListingCache, ListingCatalog, ListingResolver, RutorSource, SqliteCatalog,
    StreamingGateway,
};

use streamgate_server::api::create_router;
use streamgate_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("STREAMGATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(version = VERSION, "Configuration loaded successfully");
    info!(
        base_url = %config.listing.base_url,
        cache_ttl_secs = config.listing.cache_ttl_secs,
        "Listing source configured"
    );

    // Listing catalog (hash -> row, fed by searches)
    let catalog: Option<Arc<dyn ListingCatalog>> = if config.catalog.enabled {
        let catalog = SqliteCatalog::new(&config.catalog.path).with_context(|| {
            format!("Failed to open listing catalog at {:?}", config.catalog.path)
        })?;
        info!("Listing catalog initialized at {:?}", config.catalog.path);
        Some(Arc::new(catalog) as Arc<dyn ListingCatalog>)
    } else {
        info!("Listing catalog disabled, hash-only lookups need a query");
        None
    };

    // Listing source, cache and resolver
    let source = RutorSource::new(&config.listing).context("Failed to create listing source")?;
    let cache = ListingCache::new(Duration::from_secs(config.listing.cache_ttl_secs));
    let mut resolver = ListingResolver::new(Arc::new(source), cache, config.listing.max_results)
        .with_single_flight(config.listing.single_flight);
    if let Some(catalog) = &catalog {
        resolver = resolver.with_catalog(Arc::clone(catalog));
    }
    let resolver = Arc::new(resolver);

    // Content engine, if configured
    let registry = create_registry(&config).await?;

    let ready_timeout = config
        .engine
        .as_ref()
        .and_then(|e| e.ready_timeout_secs)
        .map(Duration::from_secs);
    let gateway = StreamingGateway::new(Arc::clone(&resolver), registry)
        .with_ready_timeout(ready_timeout)
        .with_content_type(config.streaming.content_type);

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        resolver,
        Arc::new(gateway),
        catalog,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");

    Ok(())
}

/// Build the content handle registry for the configured engine backend.
///
/// Without an `[engine]` section the server still searches; streams fail
/// with a source error.
async fn create_registry(config: &Config) -> Result<Option<Arc<ContentHandleRegistry>>> {
    let Some(engine_config) = &config.engine else {
        info!("No content engine configured, streaming is unavailable");
        return Ok(None);
    };

    let engine: Arc<dyn ContentEngine> = match engine_config.backend {
        EngineBackend::Librqbit => {
            let librqbit_config = engine_config
                .librqbit
                .as_ref()
                .context("librqbit backend selected but no librqbit config provided")?;
            info!(
                "Initializing embedded librqbit engine (download path: {})",
                librqbit_config.download_path
            );
            Arc::new(
                LibrqbitEngine::new(librqbit_config)
                    .await
                    .context("Failed to initialize librqbit engine")?,
            )
        }
    };

    Ok(Some(Arc::new(ContentHandleRegistry::new(engine))))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
