use super::SweepMetrics;
use std::sync::Arc;

pub struct SweepMonitor {
    metrics: Arc<SweepMetrics>,
}

impl SweepMonitor {
    pub fn new(metrics: Arc<SweepMetrics>) -> Self {
        Self { metrics }
    }

    pub fn generate_report(&self) -> String {
        let s = self.metrics.snapshot();

        let mut report = String::from("=== Sweep Metrics ===\n");
        report.push_str(&format!(
            "  Sweeps: {} completed, {} segments\n  Reads: {} ({} failed, avg {}μs)\n  Retries: {} ({:.1}s backoff)\n  Reconnects: {}\n",
            s.sweeps_completed,
            s.segments_completed,
            s.reads,
            s.failed_reads,
            s.avg_read_latency_us,
            s.retries,
            s.backoff.as_secs_f64(),
            s.reconnects,
        ));
        report
    }

    pub fn metrics(&self) -> &Arc<SweepMetrics> {
        &self.metrics
    }
}
