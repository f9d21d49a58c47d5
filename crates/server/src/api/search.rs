//! Listing search handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use streamgate_core::{GatewayError, ListingRow};
use tracing::debug;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

/// GET /search?q=...
///
/// Parsed result rows for the query, in page order.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ListingRow>>, ApiError> {
    let query = params
        .q
        .ok_or_else(|| ApiError::bad_request("Query parameter 'q' is required"))?;

    let rows = state.resolver().resolve(&query).await?;
    debug!(query = %query.trim(), rows = rows.len(), "Search served");

    Ok(Json(rows))
}

/// GET /torrent/{hash}?q=...
///
/// The row carrying `hash`. Without `q` the hash is looked up in the
/// listing catalog, which must be enabled.
pub async fn get_torrent(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ListingRow>, ApiError> {
    let row = match params.q {
        Some(query) => state.resolver().find_by_hash(&query, &hash).await?,
        None if state.resolver().has_catalog() => state.resolver().find_known(&hash)?,
        None => {
            return Err(ApiError::bad_request(
                "Query parameter 'q' is required when the catalog is disabled",
            ))
        }
    };

    row.map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("no listing with hash {}", hash)).into())
}
