//! Error types for quakeboard.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Why a feed document could not be obtained.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Connection, TLS or timeout failure
    #[error("feed unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// Body was not a GeoJSON document
    #[error("feed body is not valid GeoJSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Feed server answered with a non-success status
    #[error("feed server returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Document parsed but is not a feature collection
    #[error("unexpected feed document: {0}")]
    InvalidResponse(String),
}

/// Errors raised by dashboard state transitions.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DashboardError {
    /// Selection referenced an id present in neither collection
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl axum::response::IntoResponse for DashboardError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::UnknownEvent(_) => axum::http::StatusCode::NOT_FOUND,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
