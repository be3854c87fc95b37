use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry schedule for a single instrument read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Backoff grows by this much per consecutive failure
    pub backoff_step_ms: u64,

    /// Reconnect the link once after this many consecutive failures (0 = never)
    pub reconnect_after: usize,

    /// Give up after this many attempts in total
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_step_ms: 200,
            reconnect_after: 5,
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before `attempt` (1-based). The ladder restarts after a reconnect.
    pub fn delay_before(&self, attempt: usize) -> Duration {
        let failures = attempt.saturating_sub(1);
        let rung = if self.reconnect_after == 0 {
            failures
        } else {
            failures % self.reconnect_after
        };
        Duration::from_millis(self.backoff_step_ms * rung as u64)
    }

    /// Sum of all delays up to and including `attempt`
    pub fn total_delay(&self, attempt: usize) -> Duration {
        (1..=attempt).map(|a| self.delay_before(a)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=10)
            .map(|a| policy.delay_before(a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![0, 200, 400, 600, 800, 0, 200, 400, 600, 800]);
        assert_eq!(policy.total_delay(5), Duration::from_millis(2000));
    }

    #[test]
    fn test_no_reconnect_keeps_growing() {
        let policy = RetryPolicy {
            backoff_step_ms: 100,
            reconnect_after: 0,
            max_attempts: 4,
        };
        assert_eq!(policy.delay_before(4), Duration::from_millis(300));
    }
}
