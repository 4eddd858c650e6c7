//! Bounded retry and deadlines for remote calls

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{Error, Result};

/// Run `fut` with a deadline; expiry becomes [`Error::Timeout`]
pub async fn with_deadline<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{} did not answer within {}ms",
            what,
            limit.as_millis()
        ))),
    }
}

/// Retry policy for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Attempt `n` waits `n * backoff` before retrying
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Never retry
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Whether a failed attempt number `attempt` (1-based) may be retried.
    ///
    /// Writes are only retried when the failure proves the request never
    /// reached its target, so a retry cannot apply a write twice.
    pub fn should_retry(&self, err: &Error, is_write: bool, attempt: u32) -> bool {
        attempt <= self.max_retries && err.is_transient() && !(is_write && err.may_have_applied())
    }

    /// Run `op` until it succeeds or a failure is not retryable.
    ///
    /// Returns the final result and the number of attempts made.
    pub async fn run<T, F, Fut>(&self, what: &str, is_write: bool, mut op: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if self.should_retry(&e, is_write, attempt) => {
                    warn!(call = what, attempt, error = %e, "Transient failure, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}
