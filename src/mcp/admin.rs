// Administrative surface over the registry
//
// Serde-serializable summaries and the entry points an HTTP layer (or CLI)
// mounts directly. Chat traffic goes through the orchestrator instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::config::ToolServerConfig;
use super::connection::ConnectionState;
use super::registry::{qualify, ServerRegistry};
use super::types::{ToolDescriptor, ToolInvocation};
use crate::error::{ErrorKind, ToolError};

/// One row in a server listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: ConnectionState,
    pub tool_count: usize,
}

/// One row in a tool listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    /// Qualified `server__tool` dispatch key.
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Value,
}

impl From<ToolDescriptor> for ToolSummary {
    fn from(descriptor: ToolDescriptor) -> Self {
        Self {
            full_name: qualify(&descriptor.server_id, &descriptor.name),
            name: descriptor.name,
            description: descriptor.description,
            schema: descriptor.input_schema,
        }
    }
}

/// Administrative API over one registry instance.
#[derive(Clone)]
pub struct AdminApi {
    registry: Arc<ServerRegistry>,
}

impl AdminApi {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self { registry }
    }

    /// Register a server; returns its tools on success, a classified error
    /// otherwise. Nothing is partially registered.
    pub async fn add_server(
        &self,
        id: &str,
        config: ToolServerConfig,
    ) -> Result<Vec<ToolSummary>, ToolError> {
        let tools = self.registry.add_server(id, config).await?;
        Ok(tools.into_iter().map(ToolSummary::from).collect())
    }

    /// Remove a server. Non-throwing: false means the id was unknown.
    pub async fn remove_server(&self, id: &str) -> bool {
        self.registry.remove_server(id).await
    }

    pub async fn list_servers(&self) -> Vec<ServerSummary> {
        let mut summaries = Vec::new();
        for id in self.registry.list_servers().await {
            if let Some(connection) = self.registry.server(&id).await {
                summaries.push(ServerSummary {
                    id,
                    description: connection.description().map(str::to_string),
                    state: connection.state().await,
                    tool_count: connection.list_tools().await.len(),
                });
            }
        }
        summaries
    }

    /// Tools for one server, or the whole aggregate catalog.
    pub async fn list_tools(&self, server_id: Option<&str>) -> Result<Vec<ToolSummary>, ToolError> {
        let descriptors = match server_id {
            Some(id) => self.registry.list_server_tools(id).await?,
            None => self.registry.list_all_tools().await,
        };
        Ok(descriptors.into_iter().map(ToolSummary::from).collect())
    }

    /// Direct tool invocation, bypassing the chat loop.
    ///
    /// `args` must be a JSON object (or null for no arguments).
    pub async fn call_tool(
        &self,
        qualified_name: &str,
        args: Value,
    ) -> Result<ToolInvocation, ToolError> {
        let args = match args {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(ToolError::new(
                    ErrorKind::InvalidArgs,
                    format!("tool arguments must be a JSON object, got: {}", other),
                ))
            }
        };
        self.registry.dispatch(qualified_name, args).await
    }
}
