// Timeout and retry pipeline for remote tool operations
//
// Composition order matters: retry wraps timeout, so every attempt runs
// under a fresh budget. Never nest retries inside a single timeout window.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::ToolError;

/// Bounded retry policy with fixed or exponential delay.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Double the delay after each failed attempt.
    #[serde(default = "default_exponential")]
    pub exponential: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_exponential() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            exponential: default_exponential(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no delay. Retries disabled.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            exponential: false,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        if self.exponential {
            Duration::from_millis(self.base_delay_ms * 2u64.pow(attempt))
        } else {
            Duration::from_millis(self.base_delay_ms)
        }
    }
}

/// Race `op` against `budget`.
///
/// The timer firing yields a Timeout error carrying `label` and `server_id`;
/// the operation completing first passes its outcome through unchanged.
pub async fn with_timeout<T, F>(
    op: F,
    budget: Duration,
    label: &str,
    server_id: &str,
) -> Result<T, ToolError>
where
    F: Future<Output = Result<T, ToolError>>,
{
    match tokio::time::timeout(budget, op).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ToolError::timeout(
            label,
            server_id,
            budget.as_millis() as u64,
        )),
    }
}

/// Re-invoke `f` on retryable failures, up to the policy's attempt bound.
///
/// Each invocation builds a fresh future (and therefore a fresh timeout
/// budget when composed with [`with_timeout`]). Non-retryable errors return
/// immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, f: F) -> Result<T, ToolError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ToolError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                if attempt + 1 < attempts {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        label,
                        attempt + 1,
                        attempts,
                        err,
                        delay
                    );
                    sleep(delay).await;
                }
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(err) => Err(err),
        None => Err(ToolError::new(
            crate::error::ErrorKind::Unknown,
            format!("{} failed without a recorded error", label),
        )),
    }
}
