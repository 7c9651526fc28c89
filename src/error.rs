use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced to HTTP clients in strict mode
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unreadable request body: {0}")]
    UnreadableBody(#[from] BytesRejection),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Build a `{"message": ...}` response with the given status
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnreadableBody(rejection) => rejection.status(),
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        error_response(status, self.to_string())
    }
}
