//! Route handlers

pub mod alerts;
pub mod frames;
pub mod session;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error body returned by handlers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toast: Option<alerting::Toast>,
}

pub(crate) fn error(status: StatusCode, message: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
            toast: None,
        }),
    )
}
