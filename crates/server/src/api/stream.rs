//! Byte-range media streaming.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use streamgate_core::StreamRequest;
use tracing::info;

use super::error::ApiError;
use super::search::SearchParams;
use crate::state::AppState;

/// GET /stream/{hash}?q=...
///
/// Answers `206 Partial Content` with the requested window of the first
/// playable file. A `Range` header is mandatory.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = match headers.get(header::RANGE) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("Range header is not valid ASCII"))?
                .to_string(),
        ),
        None => None,
    };

    if params.q.is_none() && !state.resolver().has_catalog() {
        return Err(ApiError::bad_request(
            "Query parameter 'q' is required when the catalog is disabled",
        ));
    }

    let request = StreamRequest {
        content_hash: hash,
        query: params.q,
        range,
    };
    let content = state.gateway().stream(request).await?;

    info!(
        file = %content.file_name,
        range = %content.range.content_range(),
        "Serving partial content"
    );

    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, content.content_type.to_string()),
            (header::CONTENT_RANGE, content.range.content_range()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CONTENT_LENGTH, content.range.len().to_string()),
        ],
        Body::from_stream(content.body),
    )
        .into_response())
}
