use llama_chat_shared::{CompletionMessage, CompletionRequest, CompletionResponse, MessageRole};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);
const MAX_LOGGED_BODY: usize = 512;

/// Every way a backend call can fail, collapsed at the client boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unavailable(#[source] reqwest::Error),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed backend response: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Short label used in log lines so operators can tell causes apart.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Unavailable(_) => "unavailable",
            BackendError::Timeout(_) => "timeout",
            BackendError::Status { .. } => "status",
            BackendError::Protocol(_) => "protocol",
        }
    }

    /// Only failures where the request never reached the backend are safe to resend.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Unavailable(e) if e.is_connect())
    }

    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(timeout)
        } else if err.is_decode() {
            BackendError::Protocol(err.to_string())
        } else {
            BackendError::Unavailable(err)
        }
    }
}

/// Client for the OpenAI-style chat-completions endpoint of the inference backend.
///
/// Cheap to share behind an `Arc`: the inner `reqwest::Client` pools connections
/// and is safe for concurrent use.
pub struct BackendClient {
    http: Client,
    completions_url: String,
    model: String,
    temperature: f64,
    timeout: Duration,
    max_retries: u32,
}

impl BackendClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, BackendError> {
        info!(
            "Initializing backend client for {} (model: {}, timeout: {:?})",
            config.backend_url, config.model, config.request_timeout
        );
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(BackendError::Unavailable)?;

        Ok(Self {
            http,
            completions_url: config.completions_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.request_timeout,
            max_retries: config.max_retries,
        })
    }

    pub fn build_request(&self, message: &str, max_tokens: u32) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![CompletionMessage {
                role: MessageRole::User,
                content: message.to_string(),
            }],
            max_tokens,
            temperature: self.temperature,
        }
    }

    /// Sends one user message and returns the first choice's content verbatim.
    pub async fn complete(&self, message: &str, max_tokens: u32) -> Result<String, BackendError> {
        let request = self.build_request(message, max_tokens);

        let mut attempt = 0;
        loop {
            match self.send(&request).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    attempt += 1;
                    warn!(
                        "Backend connection failed ({}), retry {}/{} in {:?}",
                        e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        debug!(
            "POST {} (max_tokens: {}, {} chars)",
            self.completions_url,
            request.max_tokens,
            request.messages.iter().map(|m| m.content.len()).sum::<usize>()
        );

        let response = self
            .http
            .post(&self.completions_url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status,
                body: truncate(&body, MAX_LOGGED_BODY),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout))?;

        extract_content(&bytes)
    }
}

/// Delay before retry number `attempt + 1`: doubles from 200 ms, capped at 5 s.
fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Pulls the first choice's content out of a raw chat-completions body.
pub fn extract_content(body: &[u8]) -> Result<String, BackendError> {
    let parsed: CompletionResponse =
        serde_json::from_slice(body).map_err(|e| BackendError::Protocol(e.to_string()))?;

    if parsed.choices.is_empty() {
        return Err(BackendError::Protocol("response contained no choices".to_string()));
    }

    parsed
        .first_content()
        .map(str::to_string)
        .ok_or_else(|| BackendError::Protocol("first choice has no message content".to_string()))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
