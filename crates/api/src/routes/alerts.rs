//! Alert Routes

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::notify::UiEvent;
use crate::AppState;

/// Query parameters for alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Only events with a larger id
    pub since: Option<u64>,
    /// Maximum number of events
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub data: Vec<UiEvent>,
    pub count: usize,
}

/// Pending UI events (toasts and sound cues)
pub async fn get_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertQuery>,
) -> Json<AlertResponse> {
    let events = state.notifications.events(params.since, params.limit);
    Json(AlertResponse {
        count: events.len(),
        data: events,
    })
}
