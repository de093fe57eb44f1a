//! Retry policy with exponential backoff for analysis requests.
//!
//! Backoff doubles with each attempt, capped at `max_backoff_ms`. Only
//! transient errors (timeouts, rate limits, server errors, malformed
//! responses) are retried; permanent errors fail immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::models::RetryConfig;
use crate::domain::ports::AnalystError;

/// Retry policy configuration for handling transient analyst failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    /// Execute an operation, retrying transient failures with exponential
    /// backoff.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, AnalystError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AnalystError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("operation succeeded after {attempt} retries");
                    }
                    return Ok(result);
                }
                Err(err) if self.should_retry(&err, attempt) => {
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "attempt {} failed with transient error: {err}. Retrying in {backoff:?}",
                        attempt + 1
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt >= self.max_retries {
                        warn!("operation failed after {} attempts: {err}", attempt + 1);
                    } else {
                        debug!("permanent error, not retrying: {err}");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// `min(initial_backoff * 2^attempt, max_backoff)`
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }

    fn should_retry(&self, error: &AnalystError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}
