pub mod catalog;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod listing;
pub mod metrics;
pub mod testing;

pub use catalog::{CatalogEntry, CatalogError, ListingCatalog, SqliteCatalog};
pub use config::{
    load_config, load_config_from_str, validate_config, CatalogConfig, Config, ConfigError,
    ContentTypeMode, EngineBackend, EngineConfig, LibrqbitConfig, ListingConfig, SanitizedConfig,
    ServerConfig, StreamingConfig,
};
pub use engine::{
    ByteStream, ContentEngine, ContentFile, ContentHandle, ContentHandleRegistry, ContentPointer,
    EngineError, HandleState, LibrqbitEngine,
};
pub use gateway::{
    ByteRange, GatewayError, PartialContent, RangeRequest, StreamOutcome, StreamRequest,
    StreamingGateway,
};
pub use listing::{
    ListingCache, ListingError, ListingResolver, ListingRow, ListingSource, RutorSource,
};
