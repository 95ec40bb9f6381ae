//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timed-out execution is abandoned, not cancelled: the caller stops
//!   waiting, but work already handed to the store may still complete there

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline elapsed before the wrapped future completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {}ms", .after.as_millis())]
pub struct TimedOut {
    pub after: Duration,
}

/// Race `future` against `deadline`.
pub async fn with_deadline<F>(deadline: Duration, future: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| TimedOut { after: deadline })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let out = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins() {
        let out = with_deadline(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            7
        })
        .await;
        assert_eq!(out, Err(TimedOut { after: Duration::from_millis(100) }));
    }
}
