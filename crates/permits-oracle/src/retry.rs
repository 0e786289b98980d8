//! Exponential backoff with jitter for transient HTTP failures.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Retry behaviour for oracle and data-source calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

/// A failed call, classified by whether repeating it can help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallError {
    /// Rate limiting, 5xx, timeouts, connection resets.
    Transient(String),
    Permanent(String),
}

impl CallError {
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let message = format!("{status}: {body}");
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            CallError::Transient(message)
        } else {
            CallError::Permanent(message)
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            CallError::Transient(err.to_string())
        } else {
            CallError::Permanent(err.to_string())
        }
    }

    pub(crate) fn into_message(self) -> String {
        match self {
            CallError::Transient(m) | CallError::Permanent(m) => m,
        }
    }
}

/// Delay before retry number `attempt` (1-based), capped and jittered ±20%.
pub(crate) fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let shift = attempt.saturating_sub(1).min(10);
    let base = config.base_delay_ms.saturating_mul(1_u64 << shift);
    let capped = base.min(config.max_delay_ms);
    Duration::from_millis(jitter_ms(capped))
}

fn jitter_ms(base_ms: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as i64;
    let pct = (nanos % 41) - 20;
    let base = base_ms as i64;
    (base + base * pct / 100).max(0) as u64
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
pub(crate) async fn with_retry<F, Fut, T>(what: &str, config: &RetryConfig, mut op: F) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(CallError::Transient(message)) if retries < config.max_retries => {
                retries += 1;
                let delay = backoff_delay(retries, config);
                warn!(call = what, retry = retries, delay_ms = delay.as_millis() as u64, error = %message, "transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
