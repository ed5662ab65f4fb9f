//! Bounded retry with a fixed delay between attempts.
//!
//! [`RetryPolicy`] is plain configuration; [`retry_with_backoff`] applies it
//! to any fallible async operation. Neither knows anything about stages.

use std::future::Future;
use std::time::Duration;

/// Attempts per operation, counting the first call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(30);

/// How often and how patiently to retry one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Fixed delay slept before every attempt after the first.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, no delay.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `operation` until it succeeds or the policy's attempt budget is spent.
///
/// `operation` receives the 1-based attempt number. The error of the last
/// attempt is returned on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff_notify(policy, operation, |_, _| {}).await
}

/// Like [`retry_with_backoff`], calling `on_retry(next_attempt, &error)`
/// before each backoff sleep.
pub async fn retry_with_backoff_notify<T, E, F, Fut, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    N: FnMut(u32, &E),
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                on_retry(attempt + 1, &err);
                tracing::debug!(
                    attempt,
                    max_attempts = attempts,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    "Attempt failed, backing off",
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
