use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

const MAX_BACKOFF_SHIFT: u32 = 16;

/// Bounded exponential backoff for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }
}

/// Run `f`, retrying transient errors up to `policy.max_retries` times.
///
/// Non-transient errors are returned immediately.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first non-transient error.
pub async fn with_backoff<T, F, Fut>(
    operation: &str,
    policy: RetryPolicy,
    mut f: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Await `fut`, failing with [`LlmError::Timeout`] after `limit`.
///
/// # Errors
///
/// Returns the inner error, or `Timeout` when the deadline passes first.
pub async fn with_timeout<T, Fut>(limit: Duration, fut: Fut) -> Result<T, LlmError>
where
    Fut: Future<Output = Result<T, LlmError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| LlmError::Timeout(limit))?
}
