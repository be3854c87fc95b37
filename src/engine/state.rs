use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Sweep execution states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Idle,
    Running {
        #[serde(skip)]
        start_time: Option<Instant>,
        segments_done: usize,
    },
    Completed {
        #[serde(skip)]
        duration: Option<Duration>,
        sweeps: u64,
    },
    Stopped {
        segments_done: usize,
    },
    Error {
        error_msg: String,
    },
}

impl SweepState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &SweepState) -> bool {
        use SweepState::*;

        matches!(
            (self, target),
            (Idle, Running { .. }) |

            // progress updates and continuous restarts
            (Running { .. }, Running { .. }) |
            (Running { .. }, Completed { .. }) |
            (Running { .. }, Stopped { .. }) |
            (Running { .. }, Error { .. }) |

            (Completed { .. }, Idle) |
            (Stopped { .. }, Idle) |
            (Error { .. }, Idle)
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Running { .. } => "Running",
            Self::Completed { .. } => "Completed",
            Self::Stopped { .. } => "Stopped",
            Self::Error { .. } => "Error",
        }
    }
}

impl Default for SweepState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let idle = SweepState::Idle;
        let running = SweepState::Running {
            start_time: None,
            segments_done: 0,
        };

        assert!(idle.can_transition_to(&running));
        assert!(!running.can_transition_to(&idle));
        assert!(running.can_transition_to(&SweepState::Stopped { segments_done: 2 }));
    }

    #[test]
    fn test_terminal_states_only_reset() {
        let failed = SweepState::Error {
            error_msg: "timeout".to_string(),
        };
        let done = SweepState::Completed {
            duration: None,
            sweeps: 1,
        };
        let running = SweepState::Running {
            start_time: None,
            segments_done: 0,
        };

        assert!(failed.can_transition_to(&SweepState::Idle));
        assert!(!failed.can_transition_to(&running));
        assert!(!done.can_transition_to(&running));
        assert_eq!(done.name(), "Completed");
    }
}
