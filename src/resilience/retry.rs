use super::RetryPolicy;
use std::time::Duration;

/// Where a bounded read currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Performing `attempt` (1-based)
    Reading { attempt: usize },
    /// Waiting `delay` before `attempt`
    Retrying { attempt: usize, delay: Duration },
    /// Reopening the link before `attempt`
    Reconnecting { attempt: usize },
    /// Budget exhausted after `attempts`
    Failed { attempts: usize },
}

/// Pure retry state machine; the caller performs reads, sleeps and reconnects.
#[derive(Debug, Clone)]
pub struct RetryMachine {
    policy: RetryPolicy,
    state: RetryState,
    reconnected: bool,
}

impl RetryMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Reading { attempt: 1 },
            reconnected: false,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Attempts started so far
    pub fn attempts(&self) -> usize {
        match self.state {
            RetryState::Reading { attempt } => attempt,
            RetryState::Retrying { attempt, .. } | RetryState::Reconnecting { attempt } => attempt - 1,
            RetryState::Failed { attempts } => attempts,
        }
    }

    /// The current attempt failed
    pub fn on_failure(&mut self) -> RetryState {
        if let RetryState::Reading { attempt } = self.state {
            let next = attempt + 1;
            self.state = if attempt >= self.policy.max_attempts {
                RetryState::Failed { attempts: attempt }
            } else if !self.reconnected
                && self.policy.reconnect_after > 0
                && attempt == self.policy.reconnect_after
            {
                RetryState::Reconnecting { attempt: next }
            } else {
                RetryState::Retrying {
                    attempt: next,
                    delay: self.policy.delay_before(next),
                }
            };
        }
        self.state
    }

    /// The link was reopened (successfully or not)
    pub fn on_reconnected(&mut self) -> RetryState {
        if let RetryState::Reconnecting { attempt } = self.state {
            self.reconnected = true;
            self.state = RetryState::Retrying {
                attempt,
                delay: self.policy.delay_before(attempt),
            };
        }
        self.state
    }

    /// Backoff elapsed, start the next attempt
    pub fn begin(&mut self) -> RetryState {
        if let RetryState::Retrying { attempt, .. } = self.state {
            self.state = RetryState::Reading { attempt };
        }
        self.state
    }
}
