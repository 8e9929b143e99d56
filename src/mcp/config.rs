// Tool server endpoint configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to reach one tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Transport type (stdio or sse)
    pub transport: TransportType,

    /// Command to launch (STDIO transport)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Command arguments (STDIO transport)
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables for the launched process (STDIO transport)
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Endpoint URL (SSE transport)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Human-readable description shown in server listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the server is eligible for registration
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Standard I/O transport (local process)
    Stdio,
    /// HTTP + Server-Sent Events transport (remote server)
    Sse,
}

impl ToolServerConfig {
    /// Config for a locally-launched stdio server.
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: TransportType::Stdio,
            command: Some(command.into()),
            args,
            env: HashMap::new(),
            url: None,
            description: None,
            enabled: true,
        }
    }

    /// Config for a remote SSE server.
    pub fn sse(url: impl Into<String>) -> Self {
        Self {
            transport: TransportType::Sse,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: Some(url.into()),
            description: None,
            enabled: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate that the transport has the fields it needs.
    pub fn validate(&self, server_id: &str) -> anyhow::Result<()> {
        match self.transport {
            TransportType::Stdio => {
                if self.command.is_none() {
                    anyhow::bail!(
                        "tool server '{}': stdio transport requires 'command' field",
                        server_id
                    );
                }
            }
            TransportType::Sse => {
                if self.url.is_none() {
                    anyhow::bail!(
                        "tool server '{}': sse transport requires 'url' field",
                        server_id
                    );
                }
            }
        }
        Ok(())
    }
}
