//! Frame ingestion

use axum::{extract::State, http::StatusCode, Json};
use dms::Observation;
use std::sync::Arc;
use tracing::debug;

use super::{error, ErrorResponse};
use crate::AppState;

/// Publish the latest observation for the next detection tick
pub async fn publish_frame(
    State(state): State<Arc<AppState>>,
    Json(observation): Json<Observation>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    if observation.landmarks.is_none() && observation.image_base64.is_none() {
        return Err(error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "observation needs landmarks or image_base64",
        ));
    }
    if let Some(frame) = &observation.landmarks {
        frame
            .validate()
            .map_err(|e| error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
        debug!("Landmark frame with {} points", frame.len());
    }

    state.monitor.feed().publish(observation);
    Ok(StatusCode::ACCEPTED)
}
