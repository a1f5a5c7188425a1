use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("driver {driver_id} is not assigned to request {request_id}")]
    NotAssigned { request_id: Uuid, driver_id: Uuid },

    #[error("driver already marked arrived for request {0}")]
    AlreadyArrived(Uuid),

    #[error("request {0} already completed")]
    AlreadyCompleted(Uuid),

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::NotAssigned { .. } => "not_assigned",
            AppError::AlreadyArrived(_) => "already_arrived",
            AppError::AlreadyCompleted(_) => "already_completed",
            AppError::Validation(_) => "validation",
            AppError::BadRequest(_) => "bad_request",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::NotAssigned { .. } => StatusCode::FORBIDDEN,
            AppError::AlreadyArrived(_) | AppError::AlreadyCompleted(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::Validation(errors) => Json(json!({
                "error": "validation failed",
                "kind": self.kind(),
                "details": errors,
            })),
            _ => Json(json!({
                "error": self.to_string(),
                "kind": self.kind(),
            })),
        };

        (status, body).into_response()
    }
}
