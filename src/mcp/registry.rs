// Server registry: the single source of truth for connections and the
// flattened tool catalog
//
// Mutations (add/remove/close_all) serialize behind one write lock; reads
// take a consistent snapshot and never block each other.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use serde_json::{Map, Value};

use super::config::ToolServerConfig;
use super::connection::{ConnectionTimeouts, ToolServerConnection};
use super::pipeline::RetryPolicy;
use super::transport::{McpTransport, ToolTransport};
use super::types::{ToolDescriptor, ToolInvocation};
use crate::error::{ErrorKind, ToolError};

/// Separator between server id and tool name in a qualified name.
///
/// Guaranteed not to appear inside either segment: registration rejects ids
/// and tool names containing it.
pub const SEPARATOR: &str = "__";

/// Build the globally-unique dispatch key for a tool.
pub fn qualify(server_id: &str, tool_name: &str) -> String {
    format!("{}{}{}", server_id, SEPARATOR, tool_name)
}

/// Split a qualified name into (server id, tool name).
///
/// Exactly two non-empty segments are required; anything else is rejected
/// before any dispatch attempt.
pub fn parse_qualified_name(qualified: &str) -> Result<(&str, &str), ToolError> {
    let parts: Vec<&str> = qualified.split(SEPARATOR).collect();
    match parts.as_slice() {
        [server, tool] if !server.is_empty() && !tool.is_empty() => Ok((server, tool)),
        _ => Err(ToolError::new(
            ErrorKind::MalformedToolName,
            format!(
                "tool name '{}' is not of the form <server>{}<tool>",
                qualified, SEPARATOR
            ),
        )),
    }
}

#[derive(Default)]
struct RegistryInner {
    servers: HashMap<String, Arc<ToolServerConnection>>,
    /// Flattened catalog keyed by qualified name. Kept in lockstep with
    /// `servers`: entries exist only for successfully initialized servers.
    catalog: HashMap<String, ToolDescriptor>,
}

/// Defaults applied to every connection the registry creates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryDefaults {
    pub timeouts: ConnectionTimeouts,
    pub connect_retry: RetryPolicy,
    pub call_retry: RetryPolicy,
}

/// Owns the set of named server connections and the aggregate catalog.
///
/// Construct one per process at startup and pass it explicitly to the
/// administrative layer and the chat orchestrator.
pub struct ServerRegistry {
    defaults: RegistryDefaults,
    inner: RwLock<RegistryInner>,
}

impl ServerRegistry {
    pub fn new(defaults: RegistryDefaults) -> Self {
        Self {
            defaults,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register a server from endpoint configuration, using the production
    /// MCP transport.
    pub async fn add_server(
        &self,
        id: &str,
        config: ToolServerConfig,
    ) -> Result<Vec<ToolDescriptor>, ToolError> {
        if !config.enabled {
            return Err(ToolError::new(
                ErrorKind::InvalidArgs,
                format!("tool server '{}' is disabled in its configuration", id),
            ));
        }
        config
            .validate(id)
            .map_err(|e| ToolError::new(ErrorKind::InvalidArgs, e.to_string()))?;

        let description = config.description.clone();
        let transport = Box::new(McpTransport::new(id, config));
        self.add_server_with_transport(id, description, transport)
            .await
    }

    /// Register a server over an explicit transport.
    ///
    /// All-or-nothing: on any failure the registry is left exactly as it
    /// was. Returns the server's tool list on success.
    pub async fn add_server_with_transport(
        &self,
        id: &str,
        description: Option<String>,
        transport: Box<dyn ToolTransport>,
    ) -> Result<Vec<ToolDescriptor>, ToolError> {
        if id.is_empty() || id.contains(SEPARATOR) {
            return Err(ToolError::new(
                ErrorKind::InvalidArgs,
                format!("server id '{}' is empty or contains '{}'", id, SEPARATOR),
            ));
        }

        // One critical section for the whole registration: duplicate check,
        // initialize, catalog merge.
        let mut inner = self.inner.write().await;

        if inner.servers.contains_key(id) {
            return Err(ToolError::new(
                ErrorKind::DuplicateServer,
                format!("server '{}' is already registered", id),
            ));
        }

        let connection = Arc::new(ToolServerConnection::new(
            id,
            description,
            transport,
            self.defaults.timeouts,
            self.defaults.connect_retry,
            self.defaults.call_retry,
        ));

        connection.initialize().await?;

        let tools = connection.list_tools().await;
        for tool in &tools {
            if tool.name.contains(SEPARATOR) {
                // Would make the qualified name ambiguous; reject the whole
                // registration and tear the connection down.
                connection.close().await;
                return Err(ToolError::new(
                    ErrorKind::InvalidArgs,
                    format!(
                        "server '{}' advertises tool '{}' containing '{}'",
                        id, tool.name, SEPARATOR
                    ),
                ));
            }
        }

        for tool in &tools {
            inner.catalog.insert(qualify(id, &tool.name), tool.clone());
        }
        inner.servers.insert(id.to_string(), connection);

        tracing::info!("Registered tool server '{}' ({} tools)", id, tools.len());
        Ok(tools)
    }

    /// Bulk-register servers from configuration, skipping disabled entries
    /// and logging (not propagating) individual failures.
    pub async fn register_from_config(&self, servers: &HashMap<String, ToolServerConfig>) {
        for (id, config) in servers {
            if !config.enabled {
                tracing::debug!("Skipping disabled tool server '{}'", id);
                continue;
            }
            if let Err(err) = self.add_server(id, config.clone()).await {
                tracing::warn!("Failed to register tool server '{}': {}", id, err);
            }
        }
    }

    /// Close a server and purge its catalog entries. Returns false for an
    /// unknown id.
    pub async fn remove_server(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(connection) = inner.servers.remove(id) else {
            return false;
        };

        inner
            .catalog
            .retain(|_, descriptor| descriptor.server_id != id);
        connection.close().await;
        tracing::info!("Removed tool server '{}'", id);
        true
    }

    /// Ids of all registered servers, sorted.
    pub async fn list_servers(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner.servers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Look up one server's connection.
    pub async fn server(&self, id: &str) -> Option<Arc<ToolServerConnection>> {
        self.inner.read().await.servers.get(id).cloned()
    }

    /// One server's tools, from its cached catalog.
    pub async fn list_server_tools(&self, id: &str) -> Result<Vec<ToolDescriptor>, ToolError> {
        let connection = self.server(id).await.ok_or_else(|| {
            ToolError::new(
                ErrorKind::ServerNotFound,
                format!("server '{}' is not registered", id),
            )
        })?;
        Ok(connection.list_tools().await)
    }

    /// Snapshot of the aggregate catalog, sorted by qualified name.
    pub async fn list_all_tools(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().await;
        let mut entries: Vec<(&String, &ToolDescriptor)> = inner.catalog.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, d)| d.clone()).collect()
    }

    /// Number of registered servers.
    pub async fn server_count(&self) -> usize {
        self.inner.read().await.servers.len()
    }

    /// Route a qualified tool call to its server.
    ///
    /// Errors here are pre-dispatch only (malformed name, unknown server);
    /// once a connection is reached, failures travel inside the returned
    /// invocation.
    pub async fn dispatch(
        &self,
        qualified_name: &str,
        args: Map<String, Value>,
    ) -> Result<ToolInvocation, ToolError> {
        let (server_id, tool_name) = parse_qualified_name(qualified_name)?;

        let connection = self.server(server_id).await.ok_or_else(|| {
            ToolError::new(
                ErrorKind::ServerNotFound,
                format!("server '{}' is not registered", server_id),
            )
        })?;

        tracing::debug!("Dispatching '{}' to server '{}'", tool_name, server_id);
        Ok(connection.call(tool_name, args).await)
    }

    /// Re-fetch one server's tool list and rebuild its catalog entries.
    pub async fn refresh_server(&self, id: &str) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut inner = self.inner.write().await;
        let connection = inner
            .servers
            .get(id)
            .cloned()
            .ok_or_else(|| {
                ToolError::new(
                    ErrorKind::ServerNotFound,
                    format!("server '{}' is not registered", id),
                )
            })?;

        connection.refresh().await?;
        let tools = connection.list_tools().await;

        inner.catalog.retain(|_, d| d.server_id != id);
        for tool in &tools {
            inner.catalog.insert(qualify(id, &tool.name), tool.clone());
        }
        Ok(tools)
    }

    /// Close every connection and clear the catalog. Invoked at shutdown.
    pub async fn close_all(&self) {
        let mut inner = self.inner.write().await;
        for (id, connection) in inner.servers.drain() {
            tracing::debug!("Closing tool server '{}'", id);
            connection.close().await;
        }
        inner.catalog.clear();
        tracing::info!("Closed all tool servers");
    }
}
