//! JSON error responses for the trigger API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::recorder::TriggerOutcome;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    pub fn invalid_mode(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_MODE", message)
    }

    /// A trigger the session rejected because of its current phase.
    pub fn rejected(outcome: TriggerOutcome) -> Self {
        match outcome {
            TriggerOutcome::AlreadyActive(phase) => Self::new(
                StatusCode::CONFLICT,
                "ALREADY_ACTIVE",
                format!("A session is already {}", phase.as_str()),
            ),
            TriggerOutcome::NothingToStop(phase) => Self::new(
                StatusCode::CONFLICT,
                "NOTHING_TO_STOP",
                format!("Nothing to stop while {}", phase.as_str()),
            ),
            TriggerOutcome::Accepted => Self::internal("trigger was accepted"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "code": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
