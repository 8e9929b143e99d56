// Connection lifecycle for a single tool server
//
// Owns connect, catalog fetch, invocation, and teardown. The invariant that
// matters: there is no partially-initialized Ready state. initialize either
// completes fully or rolls the connection back to Disconnected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::pipeline::{with_retry, with_timeout, RetryPolicy};
use super::transport::ToolTransport;
use super::types::{ToolDescriptor, ToolInvocation};
use crate::error::{ErrorKind, ToolError};

/// Lifecycle state of one server registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    /// Was Ready, but a later catalog refresh failed.
    Failed,
}

/// Timeout budgets for one connection. Connect and call budgets are
/// independent knobs.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimeouts {
    pub connect: Duration,
    pub call: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            call: Duration::from_secs(60),
        }
    }
}

/// One remote tool server, end to end.
pub struct ToolServerConnection {
    id: String,
    description: Option<String>,
    transport: Box<dyn ToolTransport>,
    timeouts: ConnectionTimeouts,
    connect_retry: RetryPolicy,
    call_retry: RetryPolicy,
    state: RwLock<ConnectionState>,
    tools: RwLock<Vec<ToolDescriptor>>,
}

impl ToolServerConnection {
    pub fn new(
        id: impl Into<String>,
        description: Option<String>,
        transport: Box<dyn ToolTransport>,
        timeouts: ConnectionTimeouts,
        connect_retry: RetryPolicy,
        call_retry: RetryPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            description,
            transport,
            timeouts,
            connect_retry,
            call_retry,
            state: RwLock::new(ConnectionState::Disconnected),
            tools: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Connect and fetch the tool catalog. Idempotent: a Ready connection
    /// returns immediately.
    ///
    /// Both steps run under the connection timeout, per attempt. On failure
    /// the state rolls back to Disconnected and a classified error is raised.
    pub async fn initialize(&self) -> Result<(), ToolError> {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Ready {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        let attempt = || async {
            with_timeout(
                async {
                    self.transport.initialize().await?;
                    self.transport.list_tools().await
                },
                self.timeouts.connect,
                "initialize",
                &self.id,
            )
            .await
        };

        match with_retry(&self.connect_retry, "initialize", attempt).await {
            Ok(remote_tools) => {
                let descriptors: Vec<ToolDescriptor> = remote_tools
                    .into_iter()
                    .map(|t| ToolDescriptor {
                        name: t.name,
                        description: t.description,
                        input_schema: t.input_schema,
                        server_id: self.id.clone(),
                    })
                    .collect();

                tracing::info!(
                    "Connected to tool server '{}' with {} tools",
                    self.id,
                    descriptors.len()
                );

                *self.tools.write().await = descriptors;
                *self.state.write().await = ConnectionState::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Failed to initialize tool server '{}': {}", self.id, err);
                // Roll back: no zombie Ready state, no cached partial catalog
                if let Err(close_err) = self.transport.shutdown().await {
                    tracing::debug!(
                        "Teardown after failed initialize of '{}' reported: {}",
                        self.id,
                        close_err
                    );
                }
                *self.tools.write().await = Vec::new();
                *self.state.write().await = ConnectionState::Disconnected;
                Err(err)
            }
        }
    }

    /// The cached catalog. No remote call.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().await.clone()
    }

    /// Re-fetch the tool list from a live server, replacing the cache.
    pub async fn refresh(&self) -> Result<(), ToolError> {
        if self.state().await != ConnectionState::Ready {
            return Err(ToolError::new(
                ErrorKind::Connection,
                format!("server '{}' is not connected", self.id),
            ));
        }

        let fetched = with_timeout(
            self.transport.list_tools(),
            self.timeouts.connect,
            "refresh_tools",
            &self.id,
        )
        .await;

        match fetched {
            Ok(remote_tools) => {
                let descriptors = remote_tools
                    .into_iter()
                    .map(|t| ToolDescriptor {
                        name: t.name,
                        description: t.description,
                        input_schema: t.input_schema,
                        server_id: self.id.clone(),
                    })
                    .collect();
                *self.tools.write().await = descriptors;
                Ok(())
            }
            Err(err) => {
                *self.state.write().await = ConnectionState::Failed;
                Err(err)
            }
        }
    }

    /// Invoke a tool by its server-local name.
    ///
    /// Never returns an error through control flow: every failure comes back
    /// inside the invocation, so a broken tool call stays conversation data.
    /// An unknown name short-circuits to ToolNotFound with no network I/O.
    pub async fn call(&self, name: &str, args: Map<String, Value>) -> ToolInvocation {
        let started = Instant::now();
        let qualified_name = format!("{}{}{}", self.id, super::registry::SEPARATOR, name);

        if self.state().await != ConnectionState::Ready {
            return ToolInvocation {
                qualified_name,
                outcome: Err(ToolError::new(
                    ErrorKind::Connection,
                    format!("server '{}' is not connected", self.id),
                )),
                duration: started.elapsed(),
            };
        }

        let known = self.tools.read().await.iter().any(|t| t.name == name);
        if !known {
            return ToolInvocation {
                qualified_name,
                outcome: Err(ToolError::new(
                    ErrorKind::ToolNotFound,
                    format!("tool '{}' not found on server '{}'", name, self.id),
                )),
                duration: started.elapsed(),
            };
        }

        tracing::debug!("Calling tool '{}' on server '{}'", name, self.id);

        let outcome = with_retry(&self.call_retry, "call_tool", || {
            let args = args.clone();
            async move {
                with_timeout(
                    self.transport.call_tool(name, args),
                    self.timeouts.call,
                    "call_tool",
                    &self.id,
                )
                .await
            }
        })
        .await;

        ToolInvocation {
            qualified_name,
            outcome,
            duration: started.elapsed(),
        }
    }

    /// Tear down the transport. Idempotent; close-time errors are logged,
    /// not propagated.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Disconnected {
            return;
        }
        *state = ConnectionState::Disconnected;
        drop(state);

        self.tools.write().await.clear();
        if let Err(err) = self.transport.shutdown().await {
            tracing::warn!("Failed to close tool server '{}': {}", self.id, err);
        } else {
            tracing::info!("Closed tool server '{}'", self.id);
        }
    }
}
