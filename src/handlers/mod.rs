pub mod metrics;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::metrics::ReservoirError;
use crate::snapshot::SnapshotError;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    TooManyMetrics(String),
    Internal(String),
}

impl From<SnapshotError> for AppError {
    fn from(e: SnapshotError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<ReservoirError> for AppError {
    fn from(e: ReservoirError) -> Self {
        match e {
            // The caller sent a value the histogram cannot hold
            ReservoirError::Record { .. } => Self::BadRequest(e.to_string()),
            ReservoirError::TooManyMetrics { .. } => Self::TooManyMetrics(e.to_string()),
            ReservoirError::Creation(_) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::TooManyMetrics(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            warn!(%status, error = %message, "request failed");
        } else {
            warn!(%status, error = %message, "request rejected");
        }

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
