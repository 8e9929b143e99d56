// Toolgate - multi-server tool-calling orchestration for LLM chat
// Library exports

pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod session;

pub use chat::{ChatConfig, ChatMessage, ChatOrchestrator};
pub use config::Settings;
pub use error::{ErrorKind, ToolError};
pub use gateway::{LlmGateway, OpenAiGateway};
pub use mcp::{
    AdminApi, RegistryDefaults, RetryPolicy, ServerRegistry, ToolContent, ToolDescriptor,
    ToolInvocation, ToolServerConfig, ToolServerConnection, ToolTransport,
};
pub use session::{InMemorySessionStore, Session, SessionStore};

/// Install a default tracing subscriber honoring `RUST_LOG`.
///
/// Convenience for embedding binaries; safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
