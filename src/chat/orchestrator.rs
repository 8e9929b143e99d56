// Chat orchestrator: one user turn, end to end
//
// Drives the model/tool loop: completion → requested tool calls → results
// appended in request order → follow-up completion, bounded by max_rounds.
// Tool failures are conversation data; only the gateway can abort a round,
// and even that degrades to an apologetic assistant message rather than an
// error surfacing to the transport layer.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use crate::chat::types::{
    ChatMessage, CompletionRequest, FunctionDeclaration, ToolCallRequest,
};
use crate::error::{ErrorKind, ToolError};
use crate::gateway::LlmGateway;
use crate::mcp::registry::ServerRegistry;
use crate::session::SessionStore;

/// Per-orchestrator tuning.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model name; empty uses the gateway default.
    pub model: String,
    /// Maximum completions per turn. Exceeding it ends the turn with the
    /// best available partial content.
    pub max_rounds: usize,
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_rounds: 8,
            max_tokens: 4096,
        }
    }
}

/// Drives tool-augmented chat turns against one registry and one gateway.
pub struct ChatOrchestrator {
    gateway: Arc<dyn LlmGateway>,
    registry: Arc<ServerRegistry>,
    store: Arc<dyn SessionStore>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        registry: Arc<ServerRegistry>,
        store: Arc<dyn SessionStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            gateway,
            registry,
            store,
            config,
        }
    }

    /// Process one user message to completion.
    ///
    /// Always returns the final assistant message; gateway failures come
    /// back as degraded content, not as errors. The only hard errors are
    /// session-store ones (unknown session id).
    pub async fn run_turn(&self, session_id: &str, user_text: &str) -> Result<ChatMessage> {
        self.store
            .add_message(session_id, ChatMessage::user(user_text))
            .await?;

        let mut last_text = String::new();

        for round in 0..self.config.max_rounds {
            tracing::debug!(
                "Chat round {}/{} for session {}",
                round + 1,
                self.config.max_rounds,
                session_id
            );

            let history = self.store.get_history(session_id).await?;
            let tools: Vec<FunctionDeclaration> = self
                .registry
                .list_all_tools()
                .await
                .iter()
                .map(FunctionDeclaration::from)
                .collect();

            let request = CompletionRequest::new(self.config.model.clone(), history)
                .with_tools(tools)
                .with_max_tokens(self.config.max_tokens);

            let response = match self.gateway.complete(&request).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!("LLM gateway failure, degrading turn: {:#}", err);
                    return self
                        .finish_degraded(
                            session_id,
                            format!(
                                "I was unable to get a response from the language model: {}",
                                err
                            ),
                        )
                        .await;
                }
            };

            let Some(assistant) = response.message().cloned() else {
                tracing::error!("LLM gateway returned no choices, degrading turn");
                return self
                    .finish_degraded(
                        session_id,
                        "The language model returned an empty response.".to_string(),
                    )
                    .await;
            };

            self.store.add_message(session_id, assistant.clone()).await?;

            if !assistant.text().is_empty() {
                last_text = assistant.text().to_string();
            }

            if !assistant.has_tool_calls() {
                return Ok(assistant);
            }

            // Execute sequentially, in the order the model emitted the
            // calls; providers match results to requests positionally.
            let calls = assistant.tool_calls.clone().unwrap_or_default();
            for call in &calls {
                let result_text = self.execute_call(call).await;
                self.store
                    .add_message(session_id, ChatMessage::tool_result(&call.id, result_text))
                    .await?;
            }
        }

        tracing::warn!(
            "Session {} hit the {}-round bound; ending turn with partial content",
            session_id,
            self.config.max_rounds
        );
        let content = if last_text.is_empty() {
            "I could not finish within the allowed number of tool rounds.".to_string()
        } else {
            format!(
                "{}\n\n(Stopped after reaching the tool-round limit.)",
                last_text
            )
        };
        self.finish_degraded(session_id, content).await
    }

    /// Run one requested tool call and render its result for the transcript.
    /// Never fails: anything that goes wrong becomes structured error text
    /// the model can read.
    async fn execute_call(&self, call: &ToolCallRequest) -> String {
        let name = &call.function.name;

        let args = match parse_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(err) => {
                tracing::debug!("Unparseable arguments for '{}': {}", name, err);
                return serde_json::json!({ "error": err }).to_string();
            }
        };

        match self.registry.dispatch(name, args).await {
            Ok(invocation) => {
                if let Err(err) = &invocation.outcome {
                    tracing::debug!(
                        "Tool '{}' failed after {:?}: {}",
                        name,
                        invocation.duration,
                        err
                    );
                } else {
                    tracing::debug!("Tool '{}' completed in {:?}", name, invocation.duration);
                }
                invocation.render_text()
            }
            // Pre-dispatch failures (malformed name, unknown server) are
            // fed back to the model the same way as tool failures.
            Err(err) => serde_json::json!({ "error": err }).to_string(),
        }
    }

    async fn finish_degraded(&self, session_id: &str, content: String) -> Result<ChatMessage> {
        let message = ChatMessage::assistant(content);
        self.store.add_message(session_id, message.clone()).await?;
        Ok(message)
    }
}

/// Parse a model-provided argument string into a JSON object map.
///
/// An empty string means no arguments. Anything unparseable or non-object
/// is an InvalidArgs failure, returned as a value and never raised.
fn parse_arguments(raw: &str) -> Result<serde_json::Map<String, Value>, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ToolError::new(
            ErrorKind::InvalidArgs,
            format!("tool arguments must be a JSON object, got: {}", other),
        )),
        Err(err) => Err(ToolError::new(
            ErrorKind::InvalidArgs,
            format!("tool arguments are not valid JSON: {}", err),
        )),
    }
}
