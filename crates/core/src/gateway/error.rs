use thiserror::Error;

use crate::engine::EngineError;
use crate::listing::ListingError;

/// Errors from the streaming gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Range header is required")]
    RangeRequired,

    #[error("Malformed Range header: {0:?}")]
    MalformedRange(String),

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No playable file in {0}")]
    NoPlayableFile(String),

    #[error("Requested range not satisfiable (file is {total} bytes)")]
    RangeNotSatisfiable { total: u64 },

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid content pointer: {0}")]
    InvalidPointer(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ListingError> for GatewayError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::EmptyQuery => Self::EmptyQuery,
            ListingError::SourceUnavailable(_) | ListingError::Parse(_) => {
                Self::SourceUnavailable(err.to_string())
            }
            ListingError::Catalog(msg) => Self::Internal(msg),
        }
    }
}

impl From<EngineError> for GatewayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidPointer(msg) => Self::InvalidPointer(msg),
            EngineError::SessionFailed(_) | EngineError::ReadyTimeout(_) | EngineError::Read(_) => {
                Self::SourceUnavailable(err.to_string())
            }
            EngineError::FileOutOfRange { .. } => Self::Internal(err.to_string()),
        }
    }
}
