//! Retry with exponential backoff and jitter for transient upstream failures.

use laudo_error::{LaudoError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy applied around external model calls.
///
/// Only errors the taxonomy marks retryable are attempted again; a timed-out
/// attempt counts against the budget like any other failure. When the budget
/// is exhausted the caller sees `ServiceUnavailable`, never the raw provider
/// error.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_millis(300),
            jitter_max: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff before retrying after attempt `attempt`
    /// (1-based): `base * 2^(attempt - 1)`. Jitter is added separately.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.jitter_max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `op`, retrying transient failures up to `max_attempts` total
    /// attempts.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt) + self.jitter();
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    warn!(operation, attempts = attempt, error = %err, "retry budget exhausted");
                    return Err(LaudoError::ServiceUnavailable {
                        service: operation.to_string(),
                        retry_after: err.retry_after(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
