//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting a session (POST /start/:mode)
//! - Stopping the active session (POST /stop)
//! - Getting session status (GET /status)

use crate::api::error::{ApiError, ApiResult};
use crate::media::CaptureMode;
use crate::recorder::{SessionController, SessionPhase, SessionStatus, TriggerOutcome};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

#[derive(Clone)]
pub struct RecordingState {
    pub controller: SessionController,
}

/// Creates the recording router with all session-related endpoints.
pub fn router(state: RecordingState) -> Router {
    Router::new()
        .route("/start/:mode", post(start_recording))
        .route("/stop", post(stop_recording))
        .route("/status", get(recording_status))
        .with_state(state)
}

/// Starts a session in the given mode.
///
/// Acceptance only means the start began; whether sources were acquired is
/// reported by `GET /status`. A start while a session exists is a 409.
async fn start_recording(
    State(state): State<RecordingState>,
    Path(mode): Path<String>,
) -> ApiResult<Json<Value>> {
    let mode: CaptureMode = mode.parse().map_err(ApiError::invalid_mode)?;
    info!("Start command received via API ({})", mode);

    match state.controller.start(mode).await? {
        TriggerOutcome::Accepted => Ok(Json(json!({
            "success": true,
            "mode": mode.as_str(),
            "phase": SessionPhase::Starting.as_str(),
        }))),
        rejected => Err(ApiError::rejected(rejected)),
    }
}

/// Stops the active session. Only a session in `recording` can be stopped.
async fn stop_recording(State(state): State<RecordingState>) -> ApiResult<Json<Value>> {
    info!("Stop command received via API");

    match state.controller.stop().await? {
        TriggerOutcome::Accepted => Ok(Json(json!({
            "success": true,
            "phase": SessionPhase::Stopping.as_str(),
        }))),
        rejected => Err(ApiError::rejected(rejected)),
    }
}

async fn recording_status(State(state): State<RecordingState>) -> Json<Value> {
    let status = state.controller.status().get().await;
    Json(status_json(&status))
}

fn status_json(status: &SessionStatus) -> Value {
    json!({
        "recording": status.phase == SessionPhase::Recording,
        "phase": status.phase.as_str(),
        "mode": status.mode.map(|m| m.as_str()),
        "mime_type": status.mime_type,
        "started_at": status.started_at.map(|t| t.to_rfc3339()),
        "duration_seconds": status.duration_seconds(),
        "chunk_count": status.chunk_count,
        "byte_count": status.byte_count,
        "last_error": status.last_error,
        "last_recording": status.last_recording,
    })
}
