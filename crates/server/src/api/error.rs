//! Mapping of core errors onto HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use streamgate_core::gateway::unsatisfiable_content_range;
use streamgate_core::{GatewayError, ListingError};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid request parameters.
    BadRequest(String),
    /// Anything raised by the listing resolver or the streaming gateway.
    Gateway(GatewayError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(err) => match err {
                GatewayError::RangeRequired
                | GatewayError::MalformedRange(_)
                | GatewayError::EmptyQuery => StatusCode::BAD_REQUEST,
                GatewayError::NotFound(_) | GatewayError::NoPlayableFile(_) => {
                    StatusCode::NOT_FOUND
                }
                GatewayError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
                GatewayError::SourceUnavailable(_)
                | GatewayError::InvalidPointer(_)
                | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest(msg) => msg.clone(),
            Self::Gateway(err) => err.to_string(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        Self::Gateway(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();

        if let Self::Gateway(GatewayError::RangeNotSatisfiable { total }) = self {
            if let Ok(value) = HeaderValue::from_str(&unsatisfiable_content_range(total)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }

        response
    }
}
