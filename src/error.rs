// Error taxonomy for tool-server orchestration
//
// Every failure that crosses a module boundary carries an ErrorKind so
// callers can decide between retrying, surfacing, or feeding the error back
// into the conversation as data.

use serde::{Deserialize, Serialize};

/// Classification of orchestration failures.
///
/// Timeout and Connection are retryable; everything else is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Connection,
    ServerError,
    ToolNotFound,
    InvalidArgs,
    DuplicateServer,
    MalformedToolName,
    ServerNotFound,
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth re-attempting.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Connection)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connection => "connection",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ToolNotFound => "tool_not_found",
            ErrorKind::InvalidArgs => "invalid_args",
            ErrorKind::DuplicateServer => "duplicate_server",
            ErrorKind::MalformedToolName => "malformed_tool_name",
            ErrorKind::ServerNotFound => "server_not_found",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A classified orchestration error.
///
/// Serializable so it can be embedded in tool-result payloads fed back to
/// the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Timeout error carrying the operation label and its budget.
    pub fn timeout(label: &str, server_id: &str, budget_ms: u64) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!(
                "{} on server '{}' timed out after {}ms",
                label, server_id, budget_ms
            ),
        )
    }

    /// Classify a bare message string from an underlying transport.
    ///
    /// Heuristic substring matching; affects diagnostics only, never
    /// control-flow correctness.
    pub fn classify(message: &str) -> ErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ErrorKind::Timeout
        } else if lower.contains("connect")
            || lower.contains("refused")
            || lower.contains("reset")
            || lower.contains("broken pipe")
            || lower.contains("channel closed")
        {
            ErrorKind::Connection
        } else if lower.contains("not found") || lower.contains("unknown tool") {
            ErrorKind::ToolNotFound
        } else if lower.contains("argument") || lower.contains("invalid param") {
            ErrorKind::InvalidArgs
        } else if lower.contains("server error") || lower.contains("internal error") {
            ErrorKind::ServerError
        } else {
            ErrorKind::Unknown
        }
    }

    /// Build an error from a bare message, classifying it on the way in.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: Self::classify(&message),
            message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
