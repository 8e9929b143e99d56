// Configuration loading
// Reads ~/.toolgate/config.toml, or the path in TOOLGATE_CONFIG, falling
// back to defaults with the API key from OPENAI_API_KEY.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::chat::orchestrator::ChatConfig;
use crate::mcp::config::ToolServerConfig;
use crate::mcp::connection::ConnectionTimeouts;
use crate::mcp::pipeline::RetryPolicy;
use crate::mcp::registry::RegistryDefaults;

/// Top-level settings for an embedding process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub chat: ChatSettings,

    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Retry policy for connection establishment / catalog fetch.
    #[serde(default = "single_attempt")]
    pub connect_retry: RetryPolicy,

    /// Retry policy for in-turn tool calls. Independent from connect_retry.
    #[serde(default)]
    pub call_retry: RetryPolicy,

    /// Tool servers registered at startup, keyed by server id.
    #[serde(default)]
    pub servers: HashMap<String, ToolServerConfig>,
}

fn single_attempt() -> RetryPolicy {
    RetryPolicy::none()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            chat: ChatSettings::default(),
            timeouts: TimeoutSettings::default(),
            connect_retry: single_attempt(),
            call_retry: RetryPolicy::default(),
            servers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_rounds() -> usize {
    8
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
    #[serde(default = "default_call_ms")]
    pub call_ms: u64,
}

fn default_connect_ms() -> u64 {
    30_000
}

fn default_call_ms() -> u64 {
    60_000
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            call_ms: default_call_ms(),
        }
    }
}

impl Settings {
    /// Load settings from disk, falling back to defaults plus environment.
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        let mut settings = Self::default();
        settings.apply_env();
        Ok(settings)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        settings.apply_env();
        Ok(settings)
    }

    /// Environment wins over file for the API key.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.gateway.api_key = Some(key);
            }
        }
    }

    pub fn registry_defaults(&self) -> RegistryDefaults {
        RegistryDefaults {
            timeouts: ConnectionTimeouts {
                connect: Duration::from_millis(self.timeouts.connect_ms),
                call: Duration::from_millis(self.timeouts.call_ms),
            },
            connect_retry: self.connect_retry,
            call_retry: self.call_retry,
        }
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            model: self.gateway.model.clone(),
            max_rounds: self.chat.max_rounds,
            max_tokens: self.chat.max_tokens,
        }
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TOOLGATE_CONFIG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|home| home.join(".toolgate/config.toml"))
}
