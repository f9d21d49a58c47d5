use super::{types::Config, ConfigError, EngineBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Listing base URL parses and max_results is positive
/// - The selected engine backend has its section
/// - librqbit listen_port leaves room for a one-port range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.listing.max_results == 0 {
        return Err(ConfigError::ValidationError(
            "listing.max_results must be at least 1".to_string(),
        ));
    }

    url::Url::parse(&config.listing.base_url).map_err(|e| {
        ConfigError::ValidationError(format!(
            "listing.base_url '{}' is not a valid URL: {}",
            config.listing.base_url, e
        ))
    })?;

    if let Some(engine) = &config.engine {
        match engine.backend {
            EngineBackend::Librqbit if engine.librqbit.is_none() => {
                return Err(ConfigError::ValidationError(
                    "engine.backend = \"librqbit\" requires an [engine.librqbit] section"
                        .to_string(),
                ));
            }
            EngineBackend::Librqbit => {}
        }

        if let Some(port) = engine.librqbit.as_ref().and_then(|l| l.listen_port) {
            if port == 0 || port == u16::MAX {
                return Err(ConfigError::ValidationError(format!(
                    "engine.librqbit.listen_port must be between 1 and {}, got {}",
                    u16::MAX - 1,
                    port
                )));
            }
        }
    }

    Ok(())
}
