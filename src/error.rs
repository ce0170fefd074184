//! Error types for inkrelay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for inkrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for inkrelay.
///
/// These cover everything that can fail before the SSE stream opens.
/// Failures after the stream has started are delivered in-band as
/// `data: {"error":{...}}` frames instead (see [`crate::relay`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing target API URL")]
    MissingTarget,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::MissingTarget => StatusCode::BAD_REQUEST,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            // Non-2xx upstream responses keep their original status so the
            // browser can distinguish auth failures from server errors.
            Error::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "relay_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
