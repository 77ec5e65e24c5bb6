use super::state::AppState;
use crate::error::CaptureError;
use crate::session::{CaptureState, ControlState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlView {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlsResponse {
    pub state: String,
    #[serde(rename = "start-recording")]
    pub start_recording: ControlView,
    #[serde(rename = "stop-recording")]
    pub stop_recording: ControlView,
}

impl ControlsResponse {
    fn new(state: CaptureState, controls: ControlState) -> Self {
        Self {
            state: state.to_string(),
            start_recording: ControlView {
                enabled: controls.start_enabled,
            },
            stop_recording: ControlView {
                enabled: controls.stop_enabled,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: String,
    pub status: String,
    pub controls: ControlsResponse,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: CaptureError) -> Response {
    let status = match &err {
        CaptureError::InvalidState { .. } => StatusCode::CONFLICT,
        CaptureError::Unsupported { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CaptureError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /controls
pub async fn get_controls(State(state): State<AppState>) -> impl IntoResponse {
    let controller = &state.controller;
    Json(ControlsResponse::new(controller.state(), controller.controls()))
}

/// POST /controls/start-recording
pub async fn start_recording(State(state): State<AppState>) -> Response {
    let controller = &state.controller;

    match controller.start_capture().await {
        Ok(session_id) => {
            info!("Recording started via control surface: {}", session_id);
            (
                StatusCode::OK,
                Json(StartRecordingResponse {
                    session_id,
                    status: "recording".to_string(),
                    controls: ControlsResponse::new(controller.state(), controller.controls()),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /controls/stop-recording
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    match state.controller.stop_capture().await {
        Ok(report) => {
            info!(
                "Recording stopped via control surface: {}",
                report.stats.session_id
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => {
            error!("Failed to stop recording: {}", e);
            error_response(e)
        }
    }
}

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> Response {
    match state.controller.stats() {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active capture session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /capability
pub async fn get_capability(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.capability().clone())
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
