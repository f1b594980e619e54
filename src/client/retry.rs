//! Retry Policy
//!
//! Bounded retries with exponential backoff around a fallible async operation.

use crate::config::RetryConfig;
use crate::error::{Result, WahaError};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget plus backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Cap for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            initial_delay: config.initial_delay(),
            multiplier: config.multiplier,
            max_delay: config.max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff: no jitter, no elapsed-time cutoff
    fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_delay,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }

    /// Delays slept between attempts, in order
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (1..self.attempts)
            .map(|_| backoff.next_backoff().unwrap_or(self.max_delay))
            .collect()
    }

    /// Run `operation` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempt budget is spent.
    ///
    /// Every attempt re-runs the whole operation. The last error is returned
    /// on exhaustion.
    pub async fn run<T, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&WahaError) -> bool,
    {
        let mut delays = self.delays().into_iter();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < self.attempts && is_retryable(&err) => {
                    let delay = delays.next().unwrap_or(self.max_delay);
                    warn!(
                        attempt,
                        max_attempts = self.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
