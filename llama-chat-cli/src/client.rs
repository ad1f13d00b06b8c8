use anyhow::{bail, Context, Result};
use llama_chat_shared::{ChatRequest, ChatResponse, ErrorResponse, HealthResponse};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

/// Upper bound for a single chat round trip; the gateway itself gives up on the backend sooner.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GatewayClient {
    http: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat", self.base_url);
        debug!("POST {} (max_tokens: {})", url, request.max_tokens);

        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.detail)
                .unwrap_or_else(|_| status.to_string());
            error!("Gateway returned {}: {}", status, detail);
            bail!("gateway returned {}: {}", status, detail);
        }

        let body: ChatResponse = response.json().await?;
        Ok(body.response)
    }
}
