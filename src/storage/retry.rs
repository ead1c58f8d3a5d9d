//! Retry policy module
//!
//! One policy object shared by catalog requests, file transfers and batch
//! rounds.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::DownloaderError;

/// Number of attempts for a retried operation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Wait between attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
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
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Whether another attempt follows attempt `attempt` (1-based)
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. `label` names the operation in log lines.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, DownloaderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DownloaderError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && self.has_next(attempt) => {
                    warn!(
                        "Error {}: {}. Retrying ({}/{})...",
                        label,
                        e,
                        attempt + 1,
                        self.max_attempts
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
