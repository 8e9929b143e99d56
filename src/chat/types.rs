// Chat transcript and LLM gateway wire types
//
// The transcript model is the OpenAI tool-calling shape: assistant messages
// may carry tool_calls, tool messages answer them via tool_call_id. Keeping
// the transcript in wire form means the gateway sends history unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::registry::qualify;
use crate::mcp::types::ToolDescriptor;

/// One transcript message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system" | "user" | "assistant" | "tool"
    pub role: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls requested by an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,

    /// Links a tool-result message back to the request it answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Tool-result message answering the call with id `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|calls| !calls.is_empty())
            .unwrap_or(false)
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// The function half of a tool call: qualified name + raw argument string.
///
/// `arguments` stays a string until the orchestrator parses it: a malformed
/// payload must become conversation data, not a parse panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A tool catalog entry mapped to the gateway's function-calling schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    #[serde(rename = "type")]
    pub decl_type: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDescriptor> for FunctionDeclaration {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            decl_type: "function".to_string(),
            function: FunctionSpec {
                name: qualify(&descriptor.server_id, &descriptor.name),
                description: descriptor
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Tool from server '{}'", descriptor.server_id)),
                parameters: descriptor.input_schema.clone(),
            },
        }
    }
}

/// Request to the LLM gateway.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<FunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            tool_choice: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<FunctionDeclaration>) -> Self {
        if !tools.is_empty() {
            self.tools = Some(tools);
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from the LLM gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl CompletionResponse {
    /// The first choice's message, if any.
    pub fn message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|c| &c.message)
    }

    pub fn has_tool_calls(&self) -> bool {
        self.message().map(ChatMessage::has_tool_calls).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_message_links_back() {
        let msg = ChatMessage::tool_result("call_1", "42 gwei");
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.text(), "42 gwei");
    }

    #[test]
    fn test_has_tool_calls() {
        let mut msg = ChatMessage::assistant("thinking");
        assert!(!msg.has_tool_calls());
        msg.tool_calls = Some(vec![ToolCallRequest::new("call_1", "chain__gasPrice", "{}")]);
        assert!(msg.has_tool_calls());
        msg.tool_calls = Some(vec![]);
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_function_declaration_from_descriptor_qualifies_name() {
        let descriptor = ToolDescriptor::new("chain", "gasPrice");
        let decl = FunctionDeclaration::from(&descriptor);
        assert_eq!(decl.function.name, "chain__gasPrice");
        assert_eq!(decl.function.parameters["type"], "object");
        assert!(!decl.function.description.is_empty());
    }

    #[test]
    fn test_message_serialization_omits_absent_fields() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn test_completion_response_parses_tool_calls() {
        let json = r#"{
            "id": "resp_1",
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "chain__gasPrice", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert!(response.has_tool_calls());
        let calls = response.message().unwrap().tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "chain__gasPrice");
    }

    #[test]
    fn test_completion_request_skips_empty_tools() {
        let req = CompletionRequest::new("gpt-4o", vec![ChatMessage::user("hi")]).with_tools(vec![]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("\"tools\""));
    }
}
