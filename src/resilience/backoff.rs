//! Linear backoff between retry attempts.

use std::time::Duration;

/// Delay to wait before retry number `attempt` (1-based): `attempt * base_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(u64::from(attempt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 1000), Duration::ZERO);
        assert_eq!(calculate_backoff(1, 1000), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(2, 1000), Duration::from_millis(2000));
        assert_eq!(calculate_backoff(3, 250), Duration::from_millis(750));
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(calculate_backoff(u32::MAX, u64::MAX), Duration::from_millis(u64::MAX));
    }
}
