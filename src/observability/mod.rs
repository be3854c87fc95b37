pub mod metrics;
pub mod monitor;

pub use metrics::{MetricsSnapshot, SweepMetrics};
pub use monitor::SweepMonitor;
