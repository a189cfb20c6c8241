use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UpstreamError>;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upstream did not respond within {0}s")]
    Timeout(u64),

    #[error("No data from upstream for {0}s")]
    Idle(u64),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Network(err.to_string())
    }
}

/// Details stay in the log; the browser only ever sees a generic 500.
impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Relay request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Internal server error" })),
        )
            .into_response()
    }
}
