//! Streaming gateway.
//!
//! Maps a content hash to its listing row, obtains the shared content
//! handle, picks the playable file and serves one byte window of it with
//! HTTP partial-content semantics.

mod body;
mod error;
mod range;
mod selector;

pub use body::{RangeBody, StreamOutcome};
pub use error::GatewayError;
pub use range::{unsatisfiable_content_range, ByteRange, RangeRequest};
pub use selector::{content_type_for, is_playable, select_playable, PLAYABLE_EXTENSIONS};

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::debug;

use crate::config::ContentTypeMode;
use crate::engine::{ByteStream, ContentHandleRegistry};
use crate::listing::{ListingResolver, ListingRow};

/// One streaming request as received at the edge.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    pub content_hash: String,
    /// Query that produced the listing; `None` to look the hash up in the catalog.
    pub query: Option<String>,
    /// Raw `Range` header value.
    pub range: Option<String>,
}

/// A 206 response ready to be written.
pub struct PartialContent {
    pub range: ByteRange,
    pub content_type: &'static str,
    pub file_name: String,
    pub body: ByteStream,
}

impl std::fmt::Debug for PartialContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialContent")
            .field("range", &self.range)
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .field("body", &"<stream>")
            .finish()
    }
}

/// Serves byte windows of listed content.
///
/// Requests for the same hash share one content handle and each get their
/// own range read. Dropping the returned body cancels only that read.
pub struct StreamingGateway {
    resolver: Arc<ListingResolver>,
    registry: Option<Arc<ContentHandleRegistry>>,
    ready_timeout: Option<Duration>,
    content_type: ContentTypeMode,
}

impl StreamingGateway {
    /// Create a gateway. Without a registry every stream that reaches the
    /// acquire step fails with `SourceUnavailable`.
    pub fn new(resolver: Arc<ListingResolver>, registry: Option<Arc<ContentHandleRegistry>>) -> Self {
        Self {
            resolver,
            registry,
            ready_timeout: None,
            content_type: ContentTypeMode::default(),
        }
    }

    /// Give up waiting for readiness after `timeout`.
    pub fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_content_type(mut self, mode: ContentTypeMode) -> Self {
        self.content_type = mode;
        self
    }

    pub fn registry(&self) -> Option<&Arc<ContentHandleRegistry>> {
        self.registry.as_ref()
    }

    /// Serve the requested window of the first playable file for a hash.
    pub async fn stream(&self, request: StreamRequest) -> Result<PartialContent, GatewayError> {
        // Everything that can be checked locally is checked before network work.
        let range = request.range.as_deref().ok_or(GatewayError::RangeRequired)?;
        let range = RangeRequest::parse(range)?;
        if request.query.as_deref().is_some_and(|q| q.trim().is_empty()) {
            return Err(GatewayError::EmptyQuery);
        }

        let row = self.resolve_row(&request).await?;
        let pointer = row
            .content_pointer()
            .ok_or_else(|| GatewayError::NotFound(format!("no magnet link for {}", request.content_hash)))?;

        let registry = self.registry.as_ref().ok_or_else(|| {
            GatewayError::SourceUnavailable("no content engine configured".to_string())
        })?;

        let handle = registry.acquire(pointer)?;
        debug!(info_hash = %handle.info_hash(), "Content handle acquired");

        let files = registry.wait_ready(&handle, self.ready_timeout).await?;

        let (file_index, file) = select_playable(&files)
            .ok_or_else(|| GatewayError::NoPlayableFile(row.title().to_string()))?;
        debug!(info_hash = %handle.info_hash(), file = %file.name, index = file_index, "Playable file selected");

        let range = range.resolve(file.length)?;
        let content_type = content_type_for(&file.name, self.content_type);

        let read = registry
            .open_range(&handle, file_index, range.start, range.end)
            .await?;
        debug!(
            info_hash = %handle.info_hash(),
            range = %range.content_range(),
            "Streaming range"
        );

        Ok(PartialContent {
            range,
            content_type,
            file_name: file.name.clone(),
            body: RangeBody::new(read, handle.info_hash(), range.len()).boxed(),
        })
    }

    async fn resolve_row(&self, request: &StreamRequest) -> Result<ListingRow, GatewayError> {
        let hash = &request.content_hash;
        let row = match &request.query {
            Some(query) => self.resolver.find_by_hash(query, hash).await?,
            None => self.resolver.find_known(hash)?,
        };

        row.ok_or_else(|| GatewayError::NotFound(format!("no listing with hash {}", hash)))
    }
}
