//! Types for the content engine abstraction.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::listing::extract_info_hash;

/// Pull-based byte stream returned by a range read.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// A validated magnet pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPointer {
    uri: String,
    info_hash: String,
}

impl ContentPointer {
    /// Accept `magnet:?` URIs carrying a 40-hex `btih` fragment.
    pub fn parse(uri: &str) -> Result<Self, EngineError> {
        let uri = uri.trim();
        if !uri.starts_with("magnet:?") {
            return Err(EngineError::InvalidPointer(format!(
                "not a magnet URI: {}",
                uri
            )));
        }

        let info_hash = extract_info_hash(uri).ok_or_else(|| {
            EngineError::InvalidPointer(format!("no btih info hash in {}", uri))
        })?;

        Ok(Self {
            uri: uri.to_string(),
            info_hash,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Lowercase 40-hex info hash.
    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }
}

/// One file inside a content unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    /// Path within the content unit.
    pub name: String,
    /// Length in bytes.
    pub length: u64,
}

impl ContentFile {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Errors from content engines and the handle registry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid content pointer: {0}")]
    InvalidPointer(String),

    #[error("Content session failed: {0}")]
    SessionFailed(String),

    #[error("Content not ready after {0}s")]
    ReadyTimeout(u64),

    #[error("File index {index} out of range ({count} files)")]
    FileOutOfRange { index: usize, count: usize },

    #[error("Range read failed: {0}")]
    Read(String),
}

/// Trait for swarm content engines.
///
/// An engine manages one session per info hash. Sessions are started once
/// and then shared by every range read against that content.
#[async_trait]
pub trait ContentEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Begin (or join) the session for `pointer`.
    async fn start_session(&self, pointer: &ContentPointer) -> Result<(), EngineError>;

    /// Suspend until the session's metadata is known and return its files
    /// in content order.
    async fn wait_ready(&self, pointer: &ContentPointer) -> Result<Vec<ContentFile>, EngineError>;

    /// Open an independent read of bytes `start..=end` of one file.
    ///
    /// The stream yields exactly `end - start + 1` bytes unless it fails.
    async fn open_range(
        &self,
        pointer: &ContentPointer,
        file_index: usize,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, EngineError>;
}
