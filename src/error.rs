//! Caller-facing error taxonomy
//!
//! Only request-fatal conditions live here. Retrieval degradation (missing
//! artifacts) and background task failures are logged where they happen and
//! never surface as errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Rejected before any external call (empty query, bad identifiers)
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced session or question does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Store read/write failed and could not be retried
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Anything else (upstream call setup, corpus load)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Persistence(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
