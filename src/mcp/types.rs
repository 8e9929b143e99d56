// Core types for the tool-server layer
//
// Wire-compatible with the MCP tool schema: descriptors carry a JSON-schema
// input description, call results are lists of tagged content blocks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::ToolError;

/// A callable tool advertised by one server.
///
/// Invariant: `name` is unique within its owning server; global uniqueness
/// comes from the registry's qualified `server__tool` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-schema-like input description. `{"type":"object"}` when the
    /// server advertises none.
    pub input_schema: Value,
    /// Owning server id.
    pub server_id: String,
}

impl ToolDescriptor {
    pub fn new(server_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: empty_object_schema(),
            server_id: server_id.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// The default input schema for tools that advertise none.
pub fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// One block of tool output, MCP wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    #[serde(rename = "resource")]
    Resource { resource: Value },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        ToolContent::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolContent::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Outcome of a tool call: content blocks or a classified failure.
///
/// `ToolServerConnection::call` always returns this as a value: a failed
/// tool call is conversation data, not a control-flow event.
pub type ToolOutcome = Result<Vec<ToolContent>, ToolError>;

/// A completed tool invocation with its timing.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub qualified_name: String,
    pub outcome: ToolOutcome,
    pub duration: Duration,
}

impl ToolInvocation {
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// Flatten the outcome into transcript text.
    ///
    /// Non-text blocks become placeholders; failures become a structured
    /// JSON error object the model can read.
    pub fn render_text(&self) -> String {
        match &self.outcome {
            Ok(blocks) => {
                let parts: Vec<String> = blocks
                    .iter()
                    .map(|block| match block {
                        ToolContent::Text { text } => text.clone(),
                        ToolContent::Image { mime_type, data } => {
                            format!("[image {} ({} bytes base64)]", mime_type, data.len())
                        }
                        ToolContent::Resource { resource } => resource.to_string(),
                    })
                    .collect();
                let joined = parts.join("\n");
                if joined.trim().is_empty() {
                    "(no output)".to_string()
                } else {
                    joined
                }
            }
            Err(err) => serde_json::json!({ "error": err }).to_string(),
        }
    }
}
