// End-to-end orchestrator tests over mock transports and a scripted gateway

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use toolgate::chat::types::{ChatMessage, Choice, CompletionRequest, CompletionResponse, ToolCallRequest};
use toolgate::chat::{ChatConfig, ChatOrchestrator};
use toolgate::gateway::LlmGateway;
use toolgate::mcp::transport::RemoteTool;
use toolgate::mcp::{RegistryDefaults, RetryPolicy, ServerRegistry, ToolContent, ToolTransport};
use toolgate::session::{InMemorySessionStore, SessionStore};
use toolgate::ErrorKind;

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Tool server transport with per-tool latency and a shared call log.
struct MockTransport {
    tools: Vec<(&'static str, u64)>, // (name, latency ms)
    call_log: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicU32>,
    fail_with: Option<&'static str>,
}

impl MockTransport {
    fn new(tools: Vec<(&'static str, u64)>) -> (Box<Self>, Arc<Mutex<Vec<String>>>, Arc<AtomicU32>) {
        let call_log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicU32::new(0));
        let transport = Box::new(Self {
            tools,
            call_log: call_log.clone(),
            calls: calls.clone(),
            fail_with: None,
        });
        (transport, call_log, calls)
    }
}

#[async_trait]
impl ToolTransport for MockTransport {
    async fn initialize(&self) -> std::result::Result<(), toolgate::ToolError> {
        Ok(())
    }

    async fn list_tools(&self) -> std::result::Result<Vec<RemoteTool>, toolgate::ToolError> {
        Ok(self
            .tools
            .iter()
            .map(|(name, _)| RemoteTool {
                name: name.to_string(),
                description: None,
                input_schema: serde_json::json!({"type": "object", "properties": {}}),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> std::result::Result<Vec<ToolContent>, toolgate::ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_with {
            return Err(toolgate::ToolError::from_message(message));
        }
        let latency = self
            .tools
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, ms)| *ms)
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(latency)).await;
        self.call_log.lock().unwrap().push(format!(
            "{}({})",
            name,
            serde_json::to_string(&args).unwrap()
        ));
        Ok(vec![ToolContent::text(format!("{} result", name))])
    }

    async fn shutdown(&self) -> std::result::Result<(), toolgate::ToolError> {
        Ok(())
    }
}

/// Gateway that plays back a fixed sequence of responses, then text.
struct ScriptedGateway {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests_seen: AtomicU32,
}

impl ScriptedGateway {
    fn new(responses: Vec<CompletionResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests_seen: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests_seen.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => Ok(response),
            None => Ok(text_response("done")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}

/// Gateway that always requests another tool call, like a runaway model.
struct LoopingGateway {
    requests_seen: AtomicU32,
}

#[async_trait]
impl LlmGateway for LoopingGateway {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        let n = self.requests_seen.fetch_add(1, Ordering::SeqCst);
        Ok(tool_call_response(vec![ToolCallRequest::new(
            format!("call_{}", n),
            "chain__gasPrice",
            "{}",
        )]))
    }

    fn name(&self) -> &str {
        "looping"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}

/// Gateway that fails every request.
struct BrokenGateway;

#[async_trait]
impl LlmGateway for BrokenGateway {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        anyhow::bail!("status 503 upstream unavailable")
    }

    fn name(&self) -> &str {
        "broken"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}

fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        id: "resp".to_string(),
        model: "mock-model".to_string(),
        choices: vec![Choice {
            message: ChatMessage::assistant(text),
            finish_reason: Some("stop".to_string()),
        }],
    }
}

fn tool_call_response(calls: Vec<ToolCallRequest>) -> CompletionResponse {
    CompletionResponse {
        id: "resp".to_string(),
        model: "mock-model".to_string(),
        choices: vec![Choice {
            message: ChatMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(calls),
                tool_call_id: None,
            },
            finish_reason: Some("tool_calls".to_string()),
        }],
    }
}

fn registry() -> Arc<ServerRegistry> {
    Arc::new(ServerRegistry::new(RegistryDefaults {
        connect_retry: RetryPolicy::none(),
        call_retry: RetryPolicy::none(),
        ..Default::default()
    }))
}

fn orchestrator(
    gateway: Arc<dyn LlmGateway>,
    registry: Arc<ServerRegistry>,
    store: Arc<InMemorySessionStore>,
    max_rounds: usize,
) -> ChatOrchestrator {
    ChatOrchestrator::new(
        gateway,
        registry,
        store,
        ChatConfig {
            model: String::new(),
            max_rounds,
            max_tokens: 1024,
        },
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_gas_price_scenario_round_trip() {
    let registry = registry();
    let (transport, call_log, _) = MockTransport::new(vec![("gasPrice", 0)]);
    registry
        .add_server_with_transport("chain", Some("chain tools".to_string()), transport)
        .await
        .unwrap();

    let gateway = ScriptedGateway::new(vec![
        tool_call_response(vec![ToolCallRequest::new("call_1", "chain__gasPrice", "{}")]),
        text_response("Gas is cheap right now."),
    ]);
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_session(Some("You are helpful.")).await.unwrap();

    let orchestrator = orchestrator(gateway.clone(), registry, store.clone(), 5);
    let final_message = orchestrator
        .run_turn(&session_id, "What's the gas price?")
        .await
        .unwrap();

    assert_eq!(final_message.text(), "Gas is cheap right now.");
    assert!(!final_message.has_tool_calls());

    // Tool was invoked once, with empty arguments
    assert_eq!(call_log.lock().unwrap().as_slice(), ["gasPrice({})"]);

    // Transcript: system, user, assistant(tool_calls), tool, assistant
    let history = store.get_history(&session_id).await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[2].role, "assistant");
    assert!(history[2].has_tool_calls());
    assert_eq!(history[3].role, "tool");
    assert_eq!(history[3].tool_call_id.as_deref(), Some("call_1"));
    assert!(history[3].text().contains("gasPrice result"));
    assert_eq!(history[4].role, "assistant");

    // Two completions: the tool round and the final answer
    assert_eq!(gateway.requests_seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_tool_results_keep_request_order_despite_latency() {
    let registry = registry();
    // A slowest, B fastest, C in between
    let (transport, _, _) = MockTransport::new(vec![("a", 60), ("b", 1), ("c", 20)]);
    registry
        .add_server_with_transport("srv", None, transport)
        .await
        .unwrap();

    let gateway = ScriptedGateway::new(vec![
        tool_call_response(vec![
            ToolCallRequest::new("call_a", "srv__a", "{}"),
            ToolCallRequest::new("call_b", "srv__b", "{}"),
            ToolCallRequest::new("call_c", "srv__c", "{}"),
        ]),
        text_response("all done"),
    ]);
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_session(None).await.unwrap();

    orchestrator(gateway, registry, store.clone(), 5)
        .run_turn(&session_id, "run all three")
        .await
        .unwrap();

    let history = store.get_history(&session_id).await.unwrap();
    let tool_ids: Vec<&str> = history
        .iter()
        .filter(|m| m.role == "tool")
        .map(|m| m.tool_call_id.as_deref().unwrap())
        .collect();
    assert_eq!(tool_ids, vec!["call_a", "call_b", "call_c"]);
}

#[tokio::test]
async fn test_runaway_model_stops_at_round_bound() {
    let registry = registry();
    let (transport, _, _) = MockTransport::new(vec![("gasPrice", 0)]);
    registry
        .add_server_with_transport("chain", None, transport)
        .await
        .unwrap();

    let gateway = Arc::new(LoopingGateway {
        requests_seen: AtomicU32::new(0),
    });
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_session(None).await.unwrap();

    let final_message = orchestrator(gateway.clone(), registry, store.clone(), 5)
        .run_turn(&session_id, "loop forever")
        .await
        .unwrap();

    assert!(!final_message.text().is_empty());
    assert_eq!(gateway.requests_seen.load(Ordering::SeqCst), 5);

    // Every requested call got its answer: no orphaned tool_calls
    let history = store.get_history(&session_id).await.unwrap();
    let requested: usize = history
        .iter()
        .filter_map(|m| m.tool_calls.as_ref().map(Vec::len))
        .sum();
    let answered = history.iter().filter(|m| m.role == "tool").count();
    assert_eq!(requested, answered);
}

#[tokio::test]
async fn test_gateway_failure_degrades_turn_instead_of_erroring() {
    let registry = registry();
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_session(None).await.unwrap();

    let final_message = orchestrator(Arc::new(BrokenGateway), registry, store.clone(), 5)
        .run_turn(&session_id, "hello")
        .await
        .unwrap();

    assert_eq!(final_message.role, "assistant");
    assert!(final_message.text().contains("503"));

    // The degraded message is persisted as the last transcript entry
    let history = store.get_history(&session_id).await.unwrap();
    assert_eq!(history.last().unwrap().text(), final_message.text());
}

#[tokio::test]
async fn test_malformed_arguments_fed_back_as_error_data() {
    let registry = registry();
    let (transport, _, calls) = MockTransport::new(vec![("gasPrice", 0)]);
    registry
        .add_server_with_transport("chain", None, transport)
        .await
        .unwrap();

    let gateway = ScriptedGateway::new(vec![
        tool_call_response(vec![ToolCallRequest::new(
            "call_1",
            "chain__gasPrice",
            "{not valid json",
        )]),
        text_response("recovered"),
    ]);
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_session(None).await.unwrap();

    let final_message = orchestrator(gateway, registry, store.clone(), 5)
        .run_turn(&session_id, "gas?")
        .await
        .unwrap();

    // Turn completed; the bad call never reached the transport
    assert_eq!(final_message.text(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let history = store.get_history(&session_id).await.unwrap();
    let tool_message = history.iter().find(|m| m.role == "tool").unwrap();
    let payload: Value = serde_json::from_str(tool_message.text()).unwrap();
    assert_eq!(payload["error"]["kind"], "invalid_args");
}

#[tokio::test]
async fn test_dispatch_after_remove_is_server_not_found_with_no_network() {
    let registry = registry();
    let (transport, _, calls) = MockTransport::new(vec![("gasPrice", 0)]);
    registry
        .add_server_with_transport("chain", None, transport)
        .await
        .unwrap();
    assert!(registry.remove_server("chain").await);

    let err = registry
        .dispatch("chain__gasPrice", Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServerNotFound);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tool_failure_becomes_conversation_data() {
    let registry = registry();
    let (mut transport, _, _) = MockTransport::new(vec![("gasPrice", 0)]);
    transport.fail_with = Some("connection reset by peer");
    registry
        .add_server_with_transport("chain", None, transport)
        .await
        .unwrap();

    let gateway = ScriptedGateway::new(vec![
        tool_call_response(vec![ToolCallRequest::new("call_1", "chain__gasPrice", "{}")]),
        text_response("sorry, the tool is down"),
    ]);
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_session(None).await.unwrap();

    let final_message = orchestrator(gateway, registry, store.clone(), 5)
        .run_turn(&session_id, "gas?")
        .await
        .unwrap();
    assert_eq!(final_message.text(), "sorry, the tool is down");

    let history = store.get_history(&session_id).await.unwrap();
    let tool_message = history.iter().find(|m| m.role == "tool").unwrap();
    let payload: Value = serde_json::from_str(tool_message.text()).unwrap();
    assert_eq!(payload["error"]["kind"], "connection");
    assert!(!payload["error"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_server_in_call_is_fed_back_and_turn_continues() {
    let registry = registry();
    let gateway = ScriptedGateway::new(vec![
        tool_call_response(vec![ToolCallRequest::new("call_1", "ghost__tool", "{}")]),
        text_response("I don't have that tool."),
    ]);
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = store.create_session(None).await.unwrap();

    let final_message = orchestrator(gateway, registry, store.clone(), 5)
        .run_turn(&session_id, "use ghost tool")
        .await
        .unwrap();
    assert_eq!(final_message.text(), "I don't have that tool.");

    let history = store.get_history(&session_id).await.unwrap();
    let tool_message = history.iter().find(|m| m.role == "tool").unwrap();
    let payload: Value = serde_json::from_str(tool_message.text()).unwrap();
    assert_eq!(payload["error"]["kind"], "server_not_found");
}
