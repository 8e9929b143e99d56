// OpenAI-compatible gateway implementation
//
// Works against any endpoint speaking the /v1/chat/completions format
// (OpenAI, Grok, Mistral, local inference servers).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::LlmGateway;
use crate::chat::types::{CompletionRequest, CompletionResponse};
use crate::error::{ErrorKind, ToolError};
use crate::mcp::pipeline::{with_retry, RetryPolicy};

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Clone)]
pub struct OpenAiGateway {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    gateway_name: String,
    retry: RetryPolicy,
}

impl OpenAiGateway {
    /// Gateway against api.openai.com.
    pub fn openai(api_key: impl Into<String>) -> Result<Self> {
        Self::new(api_key, "https://api.openai.com", "gpt-4o", "openai")
    }

    /// Gateway against any OpenAI-compatible endpoint.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        gateway_name: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
            gateway_name: gateway_name.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One attempt, no retry. Classifies transport failures so the retry
    /// wrapper can tell transient from permanent.
    async fn complete_once(&self, request: &CompletionRequest) -> Result<CompletionResponse, ToolError> {
        let mut request = request.clone();
        if request.model.is_empty() {
            request.model = self.default_model.clone();
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!("Sending completion request to {} ({})", url, request.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    ErrorKind::Timeout
                } else if e.is_connect() {
                    ErrorKind::Connection
                } else {
                    ErrorKind::Unknown
                };
                ToolError::new(kind, format!("completion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = if status.is_server_error() {
                ErrorKind::ServerError
            } else {
                ErrorKind::Unknown
            };
            return Err(ToolError::new(
                kind,
                format!("completion request failed: status {} body {}", status, body),
            ));
        }

        response.json::<CompletionResponse>().await.map_err(|e| {
            ToolError::new(
                ErrorKind::Unknown,
                format!("failed to parse completion response: {}", e),
            )
        })
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let response = with_retry(&self.retry, "llm_complete", || self.complete_once(request))
            .await
            .with_context(|| format!("{} completion failed", self.gateway_name))?;
        Ok(response)
    }

    fn name(&self) -> &str {
        &self.gateway_name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
