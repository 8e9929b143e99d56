// Tool server layer
//
// Connects to a dynamic set of remote MCP tool servers and routes qualified
// tool calls to them.
//
// Architecture:
// - ToolServerConnection: one server's lifecycle (connect, catalog, call, close)
// - ServerRegistry: the set of named connections + the flattened catalog
// - pipeline: timeout/retry wrapper shared by connect and call paths
// - AdminApi: the surface an HTTP layer mounts for server management

pub mod admin;
pub mod config;
pub mod connection;
pub mod pipeline;
pub mod registry;
pub mod transport;
pub mod types;

pub use admin::{AdminApi, ServerSummary, ToolSummary};
pub use config::{ToolServerConfig, TransportType};
pub use connection::{ConnectionState, ConnectionTimeouts, ToolServerConnection};
pub use pipeline::{with_retry, with_timeout, RetryPolicy};
pub use registry::{parse_qualified_name, qualify, RegistryDefaults, ServerRegistry, SEPARATOR};
pub use transport::{McpTransport, RemoteTool, ToolTransport};
pub use types::{ToolContent, ToolDescriptor, ToolInvocation, ToolOutcome};
