use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use llama_chat_shared::{ChatRequest, ChatResponse, HealthResponse};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnFailure, TraceLayer},
};
use tracing::{error, warn, Level};

use crate::error::ApiError;
use crate::llm::BackendClient;

pub fn router(backend: Arc<BackendClient>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        // The handler already logs backend failures at error level
        .layer(TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::DEBUG)))
        .layer(CorsLayer::permissive())
        .with_state(backend)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

async fn chat(
    State(backend): State<Arc<BackendClient>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.inspect_err(|e| warn!("Rejected chat request: {}", e.body_text()))?;
    let max_tokens = validate(&request).inspect_err(|e| warn!("Rejected chat request: {}", e))?;

    let response = backend
        .complete(&request.message, max_tokens)
        .await
        .map_err(|e| {
            error!(kind = e.kind(), "Error calling inference backend: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ChatResponse { response }))
}

/// Checks the client input and returns the token budget to forward.
pub fn validate(request: &ChatRequest) -> Result<u32, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }
    if request.max_tokens <= 0 {
        return Err(ApiError::Validation(format!(
            "max_tokens must be a positive integer, got {}",
            request.max_tokens
        )));
    }
    u32::try_from(request.max_tokens).map_err(|_| {
        ApiError::Validation(format!("max_tokens is too large: {}", request.max_tokens))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_request() {
        assert_eq!(validate(&ChatRequest::new("Hello").with_max_tokens(50)).unwrap(), 50);
        assert_eq!(validate(&ChatRequest::new("Hello")).unwrap(), 100);
    }

    #[test]
    fn rejects_blank_message() {
        for message in ["", "   ", "\n\t"] {
            assert!(matches!(
                validate(&ChatRequest::new(message)),
                Err(ApiError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_non_positive_and_oversized_max_tokens() {
        for max_tokens in [0, -1, i64::MIN, i64::from(u32::MAX) + 1] {
            assert!(matches!(
                validate(&ChatRequest::new("Hello").with_max_tokens(max_tokens)),
                Err(ApiError::Validation(_))
            ));
        }
    }
}
