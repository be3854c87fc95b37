use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one sweep worker
#[derive(Debug, Default)]
pub struct SweepMetrics {
    reads: AtomicU64,
    failed_reads: AtomicU64,
    retries: AtomicU64,
    reconnects: AtomicU64,
    segments_completed: AtomicU64,
    sweeps_completed: AtomicU64,
    backoff_us: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub failed_reads: u64,
    pub retries: u64,
    pub reconnects: u64,
    pub segments_completed: u64,
    pub sweeps_completed: u64,
    pub backoff: Duration,
    pub avg_read_latency_us: u64,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn failed_reads(&self) -> u64 {
        self.failed_reads.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn segments_completed(&self) -> u64 {
        self.segments_completed.load(Ordering::Relaxed)
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps_completed.load(Ordering::Relaxed)
    }

    /// Total time spent waiting between retries
    pub fn backoff(&self) -> Duration {
        Duration::from_micros(self.backoff_us.load(Ordering::Relaxed))
    }

    pub fn record_failed_read(&self) {
        self.failed_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self, delay: Duration) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        self.backoff_us.fetch_add(delay.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segment(&self) {
        self.segments_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self) {
        self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_read(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_read(&self, start: Instant) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_read_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads(),
            failed_reads: self.failed_reads(),
            retries: self.retries(),
            reconnects: self.reconnects(),
            segments_completed: self.segments_completed(),
            sweeps_completed: self.sweeps_completed(),
            backoff: self.backoff(),
            avg_read_latency_us: self.avg_read_latency_us(),
        }
    }
}
