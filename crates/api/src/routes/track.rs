//! Tracking endpoint handler.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::metrics;
use tracing::{debug, error};

use pipeline::IngestOutcome;
use tracker_core::RawEvent;

use crate::response::{ApiError, TrackResponse};
use crate::state::AppState;

/// POST /api/track - accepts one tracker event.
///
/// Malformed bodies and unknown event types are rejected with 400 and
/// never enter the queue. Accepted events return 202: acceptance means
/// queued, not persisted.
pub async fn track_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<TrackResponse>), ApiError> {
    let event = RawEvent::from_json(body).map_err(|err| {
        debug!(error = %err, "Rejected tracking payload");
        metrics().events_rejected.inc();
        ApiError::bad_request(err.to_string())
    })?;

    let outcome = state.ingestor.ingest(event).await.map_err(|err| {
        error!(error = %err, "Failed to accept event");
        ApiError::internal("Failed to accept event")
    })?;

    let status = match outcome {
        IngestOutcome::Queued => StatusCode::ACCEPTED,
        IngestOutcome::WroteDirect | IngestOutcome::Dropped => StatusCode::OK,
    };
    Ok((status, Json(TrackResponse::from_outcome(outcome))))
}
