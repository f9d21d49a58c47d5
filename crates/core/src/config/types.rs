use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub engine: Option<EngineConfig>,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

/// Listing source and cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    /// Base URL of the search site (e.g., "https://rutor.info")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User-Agent sent with search requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Parsing stops once this many rows are collected (default: 50)
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// How long parsed results stay cached, 0 disables caching (default: 600)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Share one fetch between concurrent misses for the same query
    #[serde(default = "default_true")]
    pub single_flight: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            max_results: default_max_results(),
            cache_ttl_secs: default_cache_ttl(),
            single_flight: true,
        }
    }
}

fn default_base_url() -> String {
    "https://rutor.info".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_max_results() -> usize {
    50
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

/// Persistent hash -> listing catalog
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("streamgate.db")
}

/// Content engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Engine backend type
    pub backend: EngineBackend,
    /// Give up waiting for metadata after this many seconds (unset = wait forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_timeout_secs: Option<u64>,
    /// librqbit-specific configuration (required when backend = "librqbit")
    #[serde(default)]
    pub librqbit: Option<LibrqbitConfig>,
}

/// Available content engines
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineBackend {
    Librqbit,
}

/// Embedded librqbit session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibrqbitConfig {
    /// Where torrent data is written
    pub download_path: String,
    #[serde(default = "default_true")]
    pub enable_dht: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    /// Session persistence folder (unset = no persistence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_path: Option<String>,
}

/// Response framing for streamed media
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StreamingConfig {
    #[serde(default)]
    pub content_type: ContentTypeMode,
}

/// How the Content-Type of a streamed file is chosen
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypeMode {
    /// Always `video/mp4`, whatever the container.
    #[default]
    Fixed,
    /// Derived from the file extension.
    ByExtension,
}

/// Sanitized config for API responses (filesystem paths hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub listing: ListingConfig,
    pub catalog_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<SanitizedEngineConfig>,
    pub streaming: StreamingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_timeout_secs: Option<u64>,
    pub dht_enabled: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            listing: config.listing.clone(),
            catalog_enabled: config.catalog.enabled,
            engine: config.engine.as_ref().map(|e| SanitizedEngineConfig {
                backend: match e.backend {
                    EngineBackend::Librqbit => "librqbit".to_string(),
                },
                ready_timeout_secs: e.ready_timeout_secs,
                dht_enabled: e.librqbit.as_ref().map(|l| l.enable_dht).unwrap_or(false),
            }),
            streaming: config.streaming.clone(),
        }
    }
}
