use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ratio a value read returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Reflection, "data 0"
    S11,
    /// Transmission, "data 1"
    S21,
}

impl ValueKind {
    /// Instrument command that reads this ratio
    pub fn command(&self) -> &'static str {
        match self {
            Self::S11 => "data 0",
            Self::S21 => "data 1",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Blocking primitives of a VNA link.
///
/// Implementations do not retry; the sweep engine owns retry and reconnect
/// policy and holds the link exclusively while a sweep runs.
#[async_trait]
pub trait InstrumentLink: Send {
    /// Whether the transport is open
    fn connected(&self) -> bool;

    /// Program the next sweep range in Hz
    async fn set_sweep(&mut self, start: u64, stop: u64) -> Result<()>;

    /// Restore the instrument's own display range after a segmented sweep
    async fn reset_sweep(&mut self, start: u64, stop: u64) -> Result<()> {
        self.set_sweep(start, stop).await
    }

    /// Frequencies of the currently programmed sweep
    async fn read_frequencies(&mut self) -> Result<Vec<u64>>;

    /// Raw (re, im) ratios of the currently programmed sweep
    async fn read_values(&mut self, kind: ValueKind) -> Result<Vec<(f64, f64)>>;

    /// Close and reopen the transport
    async fn reconnect(&mut self) -> Result<()>;
}
