pub mod calibration;
pub mod core;
pub mod engine;
pub mod error;
pub mod hal;
pub mod observability;
pub mod resilience;
pub mod sweep;

pub use error::{SweepError, SweepResult};
