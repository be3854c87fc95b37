use thiserror::Error;

use crate::hal::ValueKind;

/// Result type for sweep operations
pub type SweepResult<T> = Result<T, SweepError>;

/// Errors raised while planning, acquiring or correcting a sweep
#[derive(Error, Debug)]
pub enum SweepError {
    /// Instrument link is down, the sweep cannot start
    #[error("Instrument is not connected")]
    NotConnected,

    /// Sweep plan fails its sanity checks
    #[error("Illegal sweep settings: {0}")]
    InvalidPlan(String),

    /// Instrument reported frequencies that do not match the request
    #[error("Protocol error in segment {segment}: {reason}")]
    Protocol { segment: usize, reason: String },

    /// A single read failed the plausibility checks
    #[error("Invalid {kind} data: {reason}")]
    Validation { kind: String, reason: String },

    /// Retry budget exhausted
    #[error("Failed reading {what} {attempts} times: {last}")]
    Acquisition {
        what: String,
        attempts: usize,
        last: String,
    },

    /// Calibration flags contradict each other
    #[error("Calibration is inconsistent: {0}")]
    CalibrationInconsistent(String),

    /// Sweep was stopped on request
    #[error("Sweep stopped")]
    Cancelled,

    /// Worker task terminated abnormally
    #[error("Sweep worker failed: {0}")]
    Worker(String),
}

impl SweepError {
    pub(crate) fn invalid_values(kind: ValueKind, reason: impl Into<String>) -> Self {
        Self::Validation {
            kind: kind.command().to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error is absorbed by the local retry loop
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
