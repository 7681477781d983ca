//! Session Routes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use session::{SessionError, SessionSnapshot, SessionStats};
use std::sync::{Arc, PoisonError};

use super::{error, ErrorResponse};
use crate::AppState;

/// Response for the stop endpoint
#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stats: SessionStats,
    pub duration: String,
}

/// Settings update from the settings collaborator
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    /// 1..=100
    pub sensitivity: u8,
}

/// Current session status and statistics
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.monitor.snapshot())
}

/// Start monitoring
pub async fn start_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    state.monitor.start().map(Json).map_err(|e| match e {
        SessionError::InputUnavailable(_) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
                toast: Some(alerting::Toast::input_not_ready()),
            }),
        ),
        other => error(StatusCode::CONFLICT, other),
    })
}

/// Stop monitoring
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StopResponse>, (StatusCode, Json<ErrorResponse>)> {
    let stats = state
        .monitor
        .stop()
        .map_err(|e| error(StatusCode::CONFLICT, e))?;

    Ok(Json(StopResponse {
        duration: stats.duration_hms(),
        stats,
    }))
}

/// Apply a new sensitivity
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    if !(1..=100).contains(&update.sensitivity) {
        return error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("sensitivity {} outside 1..=100", update.sensitivity),
        )
        .into_response();
    }

    let thresholds = {
        let mut detection = state.detection.lock().unwrap_or_else(PoisonError::into_inner);
        detection.sensitivity = update.sensitivity;
        detection.thresholds()
    };
    state.monitor.update_thresholds(thresholds);
    Json(thresholds).into_response()
}
