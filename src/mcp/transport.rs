// Tool server transport seam
//
// ToolTransport is the boundary the connection layer talks through; the
// production implementation wraps rust-mcp-sdk, tests substitute mocks.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use rust_mcp_sdk::mcp_client::client_runtime::create_client;
use rust_mcp_sdk::mcp_client::{ClientHandler, McpClientOptions, ToMcpClientHandler};
use rust_mcp_sdk::schema::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    ProtocolVersion,
};
use rust_mcp_sdk::task_store::InMemoryTaskStore;
use rust_mcp_sdk::{McpClient, StdioTransport, TransportOptions};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::config::{ToolServerConfig, TransportType};
use super::types::{empty_object_schema, ToolContent};
use crate::error::{ErrorKind, ToolError};

/// A tool as advertised by the remote server, before the registry stamps an
/// owning server id onto it.
#[derive(Debug, Clone)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// One remote server's streaming transport.
///
/// All errors come back pre-classified; the transport is the edge where bare
/// SDK message strings get mapped into the taxonomy.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Connect and handshake. Idempotent.
    async fn initialize(&self) -> Result<(), ToolError>;

    /// Fetch the server's tool list. Requires a prior `initialize`.
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, ToolError>;

    /// Invoke one tool by its server-local name.
    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<Vec<ToolContent>, ToolError>;

    /// Tear down the transport. Idempotent.
    async fn shutdown(&self) -> Result<(), ToolError>;
}

/// Basic client handler (no custom behavior needed)
struct BasicClientHandler;

#[async_trait]
impl ClientHandler for BasicClientHandler {}

type ListFn = Box<dyn Fn() -> BoxFuture<'static, Result<Vec<RemoteTool>, ToolError>> + Send + Sync>;
type CallFn = Box<
    dyn Fn(String, Map<String, Value>) -> BoxFuture<'static, Result<Vec<ToolContent>, ToolError>>
        + Send
        + Sync,
>;
type ShutdownFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), ToolError>> + Send + Sync>;

/// Handle to a live SDK client.
///
/// The SDK's client runtime type is not nameable outside the crate, so the
/// operations are captured as closures at connect time.
struct SdkHandle {
    list: ListFn,
    call: CallFn,
    shutdown: ShutdownFn,
}

/// Production transport backed by rust-mcp-sdk.
pub struct McpTransport {
    server_id: String,
    config: ToolServerConfig,
    handle: Mutex<Option<SdkHandle>>,
}

impl McpTransport {
    pub fn new(server_id: impl Into<String>, config: ToolServerConfig) -> Self {
        Self {
            server_id: server_id.into(),
            config,
            handle: Mutex::new(None),
        }
    }

    async fn connect_stdio(&self) -> Result<SdkHandle, ToolError> {
        let command = self.config.command.as_ref().ok_or_else(|| {
            ToolError::new(ErrorKind::Connection, "stdio transport requires a command")
        })?;

        tracing::debug!(
            "Launching tool server '{}': {} {}",
            self.server_id,
            command,
            self.config.args.join(" ")
        );

        let transport = StdioTransport::create_with_server_launch(
            command,
            self.config.args.clone(),
            if self.config.env.is_empty() {
                None
            } else {
                Some(self.config.env.clone())
            },
            TransportOptions::default(),
        )
        .map_err(|e| {
            ToolError::new(
                ErrorKind::Connection,
                format!("failed to create stdio transport: {:?}", e),
            )
        })?;

        let client_details = InitializeRequestParams {
            protocol_version: ProtocolVersion::V2025_11_25.into(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "toolgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some("Multi-server tool-calling orchestration".to_string()),
                icons: vec![],
                title: None,
                website_url: None,
            },
            meta: None,
        };

        let client = create_client(McpClientOptions {
            client_details,
            transport,
            handler: BasicClientHandler.to_mcp_client_handler(),
            task_store: Some(Arc::new(InMemoryTaskStore::new(None))),
            server_task_store: Some(Arc::new(InMemoryTaskStore::new(None))),
        });

        client.clone().start().await.map_err(|e| {
            ToolError::from_message(format!("failed to start tool server client: {}", e))
        })?;

        let list = {
            let client = client.clone();
            let fut: ListFn = Box::new(move || {
                let client = client.clone();
                async move {
                    let result = client.request_tool_list(None).await.map_err(|e| {
                        ToolError::from_message(format!("failed to list tools: {}", e))
                    })?;
                    Ok(result.tools.into_iter().map(convert_remote_tool).collect())
                }
                .boxed()
            });
            fut
        };

        let call = {
            let client = client.clone();
            let fut: CallFn = Box::new(move |name, args| {
                let client = client.clone();
                async move {
                    let params = CallToolRequestParams {
                        name,
                        arguments: if args.is_empty() { None } else { Some(args) },
                        meta: None,
                        task: None,
                    };
                    let result = client.request_tool_call(params).await.map_err(|e| {
                        ToolError::from_message(format!("tool call failed: {}", e))
                    })?;
                    let blocks = convert_content_blocks(result.content);
                    if result.is_error == Some(true) {
                        let text = blocks
                            .iter()
                            .filter_map(ToolContent::as_text)
                            .collect::<Vec<_>>()
                            .join("\n");
                        Err(ToolError::from_message(if text.is_empty() {
                            "tool reported an error".to_string()
                        } else {
                            text
                        }))
                    } else {
                        Ok(blocks)
                    }
                }
                .boxed()
            });
            fut
        };

        let shutdown = {
            let client = client.clone();
            let fut: ShutdownFn = Box::new(move || {
                let client = client.clone();
                async move {
                    client.shut_down().await.map_err(|e| {
                        ToolError::from_message(format!("shutdown failed: {}", e))
                    })
                }
                .boxed()
            });
            fut
        };

        Ok(SdkHandle {
            list,
            call,
            shutdown,
        })
    }
}

#[async_trait]
impl ToolTransport for McpTransport {
    async fn initialize(&self) -> Result<(), ToolError> {
        let mut guard = self.handle.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        match self.config.transport {
            TransportType::Stdio => {
                let handle = self.connect_stdio().await?;
                *guard = Some(handle);
                Ok(())
            }
            TransportType::Sse => Err(ToolError::new(
                ErrorKind::Connection,
                "sse transport not yet implemented",
            )),
        }
    }

    async fn list_tools(&self) -> Result<Vec<RemoteTool>, ToolError> {
        let guard = self.handle.lock().await;
        let handle = guard
            .as_ref()
            .ok_or_else(|| ToolError::new(ErrorKind::Connection, "transport not initialized"))?;
        (handle.list)().await
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<Vec<ToolContent>, ToolError> {
        let call = {
            let guard = self.handle.lock().await;
            let handle = guard.as_ref().ok_or_else(|| {
                ToolError::new(ErrorKind::Connection, "transport not initialized")
            })?;
            (handle.call)(name.to_string(), args)
        };
        call.await
    }

    async fn shutdown(&self) -> Result<(), ToolError> {
        let handle = self.handle.lock().await.take();
        match handle {
            Some(handle) => (handle.shutdown)().await,
            None => Ok(()),
        }
    }
}

fn convert_remote_tool(tool: rust_mcp_sdk::schema::Tool) -> RemoteTool {
    let input_schema =
        serde_json::to_value(&tool.input_schema).unwrap_or_else(|_| empty_object_schema());
    RemoteTool {
        name: tool.name,
        description: tool.description,
        input_schema,
    }
}

/// Convert SDK content blocks through their wire form into ours.
///
/// Going through Value keeps us off the SDK's enum internals; anything we
/// don't model (audio, resource links) degrades to its JSON text.
fn convert_content_blocks(content: Vec<rust_mcp_sdk::schema::ContentBlock>) -> Vec<ToolContent> {
    content
        .into_iter()
        .map(|block| {
            let value = serde_json::to_value(&block).unwrap_or(Value::Null);
            serde_json::from_value::<ToolContent>(value.clone())
                .unwrap_or_else(|_| ToolContent::Text {
                    text: value.to_string(),
                })
        })
        .collect()
}
