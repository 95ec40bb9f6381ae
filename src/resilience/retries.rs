//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a failed execution up to a fixed attempt budget
//! - Wait a linearly growing delay between attempts
//!
//! # Design Decisions
//! - Every execution error is retryable, timeouts included
//! - The delay only suspends the retrying call, never unrelated calls
//! - Exhaustion returns the last error; converting it into a caller-facing
//!   result is the gateway's job

use std::fmt::Display;
use std::future::Future;

use crate::config::GatewaySettings;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Attempt budget and delay for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
}

impl RetryPolicy {
    /// `max_attempts` is the total number of executions (at least 1).
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self::new(settings.retries, settings.retry_delay_ms)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `attempt_fn` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut attempt_fn: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    let delay = calculate_backoff(attempt, self.base_delay_ms);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay = ?delay,
                        error = %e,
                        "Execution failed, retrying"
                    );
                    metrics::record_retry(operation);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Execution failed, retries exhausted"
                    );
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&GatewaySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget_with_linear_delays() {
        let policy = RetryPolicy::new(3, 1000);
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), String> = policy
            .run("select", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("store down".to_string())
            })
            .await;

        assert_eq!(result, Err("store down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1000ms before attempt 2, 2000ms before attempt 3.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_success() {
        let policy = RetryPolicy::new(5, 10);
        let result: Result<u32, String> = policy
            .run("insert", |attempt| async move {
                if attempt < 2 {
                    Err("flaky".to_string())
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, 100).max_attempts(), 1);
    }
}
