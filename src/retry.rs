//! Bounded retry with exponential backoff for query fetches
//!
//! The cache itself never retries: a failed fetch rejects the entry and
//! stays rejected. Subscribers opt in to a bounded retry policy per
//! subscription, and that policy wraps the backend call *above* the cache,
//! so cache invariants never depend on retry behavior.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for a subscription's fetches
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial try
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Ceiling for the backoff delay
    pub max_delay: Duration,

    /// Backoff growth factor per attempt
    pub factor: f64,

    /// Randomize delays to avoid synchronized refetch storms
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Short delays for interactive views and tests
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            factor: 2.0,
            jitter: false,
        }
    }

    /// Backoff delay for a 0-indexed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            // 0-25% above the computed delay
            capped * (1.0 + subsec_jitter() * 0.25)
        } else {
            capped
        };

        Duration::from_secs_f64(secs)
    }
}

/// Pseudo-random value in 0.0..1.0 derived from the clock; good enough for
/// jitter without pulling in a rand dependency.
fn subsec_jitter() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1024) as f64 / 1024.0
}

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient failure, try again after backoff
    Retry,
    /// Try again after the given delay (e.g. rate limiting)
    RetryAfter(Duration),
    /// Permanent failure, surface it
    NoRetry,
}

/// Errors that can classify themselves for retry
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Run an async operation under a retry policy.
///
/// The operation is attempted once, then up to `config.max_retries` more
/// times while the error classifies as retryable. The last error is
/// returned once attempts are exhausted or a permanent failure appears.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let decision = err.retry_decision();
        if decision == RetryDecision::NoRetry {
            debug!(
                operation = operation_name,
                attempt = attempt,
                error = %err,
                "Permanent failure, not retrying"
            );
            return Err(err);
        }

        if attempt >= config.max_retries {
            warn!(
                operation = operation_name,
                attempts = attempt + 1,
                error = %err,
                "Giving up after exhausting retries"
            );
            return Err(err);
        }

        let delay = match decision {
            RetryDecision::RetryAfter(d) => d.min(config.max_delay),
            _ => config.delay_for(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient failure"
        );

        sleep(delay).await;
        attempt += 1;
    }
}
