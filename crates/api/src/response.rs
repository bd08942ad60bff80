//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use pipeline::IngestOutcome;

/// Success response for the tracking endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    /// "queued", "written", or "dropped".
    pub status: String,
    pub timestamp: i64,
}

impl TrackResponse {
    pub fn from_outcome(outcome: IngestOutcome) -> Self {
        let status = match outcome {
            IngestOutcome::Queued => "queued",
            IngestOutcome::WroteDirect => "written",
            IngestOutcome::Dropped => "dropped",
        };
        Self {
            success: true,
            status: status.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub queue_depth: u64,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// API error type.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<tracker_core::Error> for ApiError {
    fn from(err: tracker_core::Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // Internal failure detail stays in the logs, not the wire.
        let message = if status.is_server_error() {
            "Internal error".to_string()
        } else {
            err.to_string()
        };
        Self { status, message }
    }
}
