use crate::error::FetchError;
use crate::query::window::WindowError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// API error type with HTTP status code mapping.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// The warehouse could not be reached or the session is gone.
    Unavailable(String),
    /// The warehouse rejected a statement.
    Upstream(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::Unavailable(msg) => write!(f, "Warehouse unavailable: {msg}"),
            Self::Upstream(msg) => write!(f, "Warehouse query failed: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Error connecting to the warehouse: {msg}"),
            ),
            Self::Upstream(msg) => {
                tracing::error!(error = %msg, "Warehouse rejected query");
                (
                    StatusCode::BAD_GATEWAY,
                    "The warehouse rejected the query".to_string(),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Connection(msg) => Self::Unavailable(msg),
            FetchError::Query(msg) => Self::Upstream(msg),
        }
    }
}

impl From<WindowError> for ApiError {
    fn from(e: WindowError) -> Self {
        Self::BadRequest(e.to_string())
    }
}
