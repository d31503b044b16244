//! Relay errors and their HTTP mapping.
//!
//! Only failures of the proxy itself surface here. Backend error responses
//! are relayed verbatim and never become a `RelayError`.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use thiserror::Error;

/// Failure while constructing the server.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid backend url: {0}")]
    BackendUrl(#[from] url::ParseError),
    #[error("unsupported backend url {0:?}: only http://host[:port][/path] is supported")]
    UnsupportedBackend(String),
    #[error("invalid prefix pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to open capture file: {0}")]
    Capture(#[from] crate::capture::CaptureError),
}

/// Failure while relaying one request.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("failed to read request body: {0}")]
    BodyRead(BoxError),
    #[error("failed to build upstream request: {0}")]
    Upstream(#[from] axum::http::Error),
    #[error("backend request failed: {0}")]
    Backend(#[from] hyper_util::client::legacy::Error),
    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),
    #[error("proxy is shutting down")]
    Closed,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Closed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
