//! Reconnect backoff schedule shared by every provider connection task.

use std::time::Duration;

/// Exponential backoff schedule: `delay(attempt) = min(max, initial * multiplier^(attempt-1))`.
///
/// `attempt` is 1-indexed (the first reconnect attempt after a disconnect is attempt 1).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, multiplier: u32, max: Duration) -> Self {
        Self { initial, multiplier, max }
    }

    /// Delay to wait before the given 1-indexed reconnect attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let scaled = self
            .initial
            .checked_mul(self.multiplier.saturating_pow(attempt - 1))
            .unwrap_or(self.max);
        scaled.min(self.max)
    }
}

impl Default for ReconnectPolicy {
    /// Market-data provider default: 5s initial, doubling, capped at 60s.
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 2, Duration::from_secs(60))
    }
}

impl ReconnectPolicy {
    /// Fast-reconnect schedule kept for low-latency internal test/example
    /// streams that do not hit a real exchange rate limit.
    pub fn fast() -> Self {
        Self::new(Duration::from_millis(125), 2, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for(4), Duration::from_secs(40));
        assert_eq!(policy.delay_for(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for(20), Duration::from_secs(60));
    }

    #[test]
    fn treats_zero_as_first_attempt() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), policy.delay_for(1));
    }
}
