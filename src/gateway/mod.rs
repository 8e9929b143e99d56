// LLM gateway abstraction
//
// The orchestrator drives any backend that can complete a conversation and
// request tool calls in the function-calling wire format.

use anyhow::Result;
use async_trait::async_trait;

pub mod openai;

pub use openai::OpenAiGateway;

use crate::chat::types::{CompletionRequest, CompletionResponse};

/// A chat-completion backend with function calling.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Run one completion and return the full response.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Gateway name (e.g. "openai")
    fn name(&self) -> &str;

    /// Model used when the request leaves `model` empty
    fn default_model(&self) -> &str;
}
