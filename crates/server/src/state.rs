use std::sync::Arc;
use streamgate_core::{Config, ListingCatalog, ListingResolver, SanitizedConfig, StreamingGateway};

/// Shared application state
pub struct AppState {
    config: Config,
    resolver: Arc<ListingResolver>,
    gateway: Arc<StreamingGateway>,
    catalog: Option<Arc<dyn ListingCatalog>>,
}

impl AppState {
    pub fn new(
        config: Config,
        resolver: Arc<ListingResolver>,
        gateway: Arc<StreamingGateway>,
        catalog: Option<Arc<dyn ListingCatalog>>,
    ) -> Self {
        Self {
            config,
            resolver,
            gateway,
            catalog,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn resolver(&self) -> &ListingResolver {
        &self.resolver
    }

    pub fn gateway(&self) -> &StreamingGateway {
        &self.gateway
    }

    /// The listing catalog, when hash-only lookups are enabled.
    pub fn catalog(&self) -> Option<&Arc<dyn ListingCatalog>> {
        self.catalog.as_ref()
    }
}
