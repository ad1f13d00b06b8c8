use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use llama_chat_shared::ErrorResponse;
use thiserror::Error;

use crate::llm::BackendError;

/// Message returned to clients for any backend-side failure.
pub const BACKEND_FAILURE_DETAIL: &str = "Error processing chat request";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(reason) => (StatusCode::BAD_REQUEST, reason),
            ApiError::Backend(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                BACKEND_FAILURE_DETAIL.to_string(),
            ),
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
