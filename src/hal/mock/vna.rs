use crate::hal::{InstrumentLink, ValueKind};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Response of the simulated DUT: (kind, frequency, read index since the last set_sweep)
pub type ResponseFn = Arc<dyn Fn(ValueKind, u64, usize) -> Complex64 + Send + Sync>;

/// How an injected fault corrupts a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Values far outside any plausible ratio
    Implausible,
    /// One value short
    ShortRead,
    /// Transport error
    LinkError,
}

#[derive(Debug, Clone)]
struct Fault {
    kind: ValueKind,
    segment_start: Option<u64>,
    remaining: usize,
    mode: FaultMode,
}

struct PauseGate {
    segment_start: u64,
    fired: bool,
    reached: Arc<Notify>,
    resume: Arc<Notify>,
}

/// Calls observed by the simulator
#[derive(Debug, Clone, Default)]
pub struct InstrumentLog {
    pub set_sweep_calls: Vec<(u64, u64)>,
    pub reset_calls: Vec<(u64, u64)>,
    pub value_reads: usize,
    pub reconnects: usize,
}

struct NoiseSource {
    rng: StdRng,
    dist: Normal<f64>,
}

struct SimState {
    connected: bool,
    points: usize,
    range: (u64, u64),
    response: ResponseFn,
    noise: Option<NoiseSource>,
    faults: Vec<Fault>,
    reported_points: Option<usize>,
    passes: HashMap<ValueKind, usize>,
    pause: Option<PauseGate>,
    log: InstrumentLog,
}

/// In-memory VNA with a programmable DUT, noise and fault injection.
///
/// Clones share state, so a test can keep a clone to drive faults and
/// inspect the call log while the sweep worker owns another.
#[derive(Clone)]
pub struct SimulatedVna {
    inner: Arc<Mutex<SimState>>,
}

/// 25 ohm + 100 pF series load on port 1, 50 MHz first order low-pass on port 2
pub fn default_response(kind: ValueKind, freq: u64, _read: usize) -> Complex64 {
    let f = freq as f64;
    match kind {
        // DC blocked by the capacitor
        ValueKind::S11 if f == 0.0 => Complex64::new(1.0, 0.0),
        ValueKind::S11 => {
            let z = Complex64::new(25.0, -1.0 / (2.0 * PI * f * 100e-12));
            (z - 50.0) / (z + 50.0)
        }
        ValueKind::S21 => Complex64::new(1.0, 0.0) / Complex64::new(1.0, f / 50e6),
    }
}

impl SimulatedVna {
    pub fn new(points: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                connected: true,
                points,
                range: (0, 0),
                response: Arc::new(default_response),
                noise: None,
                faults: Vec::new(),
                reported_points: None,
                passes: HashMap::new(),
                pause: None,
                log: InstrumentLog::default(),
            })),
        }
    }

    pub fn with_response<F>(self, response: F) -> Self
    where
        F: Fn(ValueKind, u64, usize) -> Complex64 + Send + Sync + 'static,
    {
        self.state().response = Arc::new(response);
        self
    }

    /// Add Gaussian noise of `sigma` to both components of every value
    pub fn with_noise(self, sigma: f64, seed: u64) -> Result<Self> {
        let dist = Normal::new(0.0, sigma).map_err(|e| anyhow!("Invalid noise sigma {}: {}", sigma, e))?;
        self.state().noise = Some(NoiseSource {
            rng: StdRng::seed_from_u64(seed),
            dist,
        });
        Ok(self)
    }

    /// Report `points` frequencies regardless of the configured count
    pub fn with_reported_points(self, points: usize) -> Self {
        self.state().reported_points = Some(points);
        self
    }

    /// Corrupt the next `count` reads of `kind`, optionally only inside the
    /// segment starting at `segment_start`
    pub fn inject_fault(&self, kind: ValueKind, segment_start: Option<u64>, count: usize, mode: FaultMode) {
        self.state().faults.push(Fault {
            kind,
            segment_start,
            remaining: count,
            mode,
        });
    }

    /// Block the first value read of the segment starting at `segment_start`.
    ///
    /// Returns (reached, resume): `reached` is notified when the read is
    /// entered, the read completes after `resume` is notified.
    pub fn pause_at(&self, segment_start: u64) -> (Arc<Notify>, Arc<Notify>) {
        let reached = Arc::new(Notify::new());
        let resume = Arc::new(Notify::new());
        self.state().pause = Some(PauseGate {
            segment_start,
            fired: false,
            reached: reached.clone(),
            resume: resume.clone(),
        });
        (reached, resume)
    }

    pub fn disconnect(&self) {
        self.state().connected = false;
    }

    pub fn log(&self) -> InstrumentLog {
        self.state().log.clone()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn frequencies(state: &SimState) -> Vec<u64> {
        let (start, stop) = state.range;
        let points = state.points;
        if points <= 1 {
            return vec![start; points];
        }
        let step = (stop - start) as f64 / (points - 1) as f64;
        (0..points)
            .map(|k| start + (k as f64 * step).round() as u64)
            .collect()
    }

    fn take_fault(state: &mut SimState, kind: ValueKind) -> Option<FaultMode> {
        let segment = state.range.0;
        let fault = state.faults.iter_mut().find(|f| {
            f.kind == kind
                && f.remaining > 0
                && f.segment_start.map_or(true, |start| start == segment)
        })?;
        fault.remaining -= 1;
        Some(fault.mode)
    }

    fn take_pause(&self) -> Option<(Arc<Notify>, Arc<Notify>)> {
        let mut state = self.state();
        let segment = state.range.0;
        let gate = state.pause.as_mut()?;
        if gate.fired || gate.segment_start != segment {
            return None;
        }
        gate.fired = true;
        Some((gate.reached.clone(), gate.resume.clone()))
    }

    fn produce_values(&self, kind: ValueKind) -> Result<Vec<(f64, f64)>> {
        let mut state = self.state();
        if !state.connected {
            return Err(anyhow!("Serial port is closed"));
        }
        state.log.value_reads += 1;

        let read = {
            let counter = state.passes.entry(kind).or_insert(0);
            let read = *counter;
            *counter += 1;
            read
        };

        let frequencies = Self::frequencies(&state);
        let fault = Self::take_fault(&mut state, kind);
        match fault {
            Some(FaultMode::LinkError) => return Err(anyhow!("Timed out reading {}", kind)),
            Some(FaultMode::Implausible) => return Ok(vec![(12.5, -12.5); frequencies.len()]),
            _ => {}
        }

        let response = state.response.clone();
        let mut values: Vec<(f64, f64)> = frequencies
            .iter()
            .map(|&f| {
                let z = response(kind, f, read);
                (z.re, z.im)
            })
            .collect();

        if let Some(noise) = state.noise.as_mut() {
            for value in values.iter_mut() {
                value.0 += noise.dist.sample(&mut noise.rng);
                value.1 += noise.dist.sample(&mut noise.rng);
            }
        }

        if fault == Some(FaultMode::ShortRead) {
            values.pop();
        }
        Ok(values)
    }
}

#[async_trait]
impl InstrumentLink for SimulatedVna {
    fn connected(&self) -> bool {
        self.state().connected
    }

    async fn set_sweep(&mut self, start: u64, stop: u64) -> Result<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(anyhow!("Serial port is closed"));
        }
        if stop < start {
            return Err(anyhow!("Illegal sweep range {} - {}", start, stop));
        }
        state.range = (start, stop);
        state.passes.clear();
        state.log.set_sweep_calls.push((start, stop));
        Ok(())
    }

    async fn reset_sweep(&mut self, start: u64, stop: u64) -> Result<()> {
        let mut state = self.state();
        state.log.reset_calls.push((start, stop));
        Ok(())
    }

    async fn read_frequencies(&mut self) -> Result<Vec<u64>> {
        let state = self.state();
        if !state.connected {
            return Err(anyhow!("Serial port is closed"));
        }
        let mut frequencies = Self::frequencies(&state);
        if let Some(points) = state.reported_points {
            frequencies.resize(points, state.range.1);
        }
        Ok(frequencies)
    }

    async fn read_values(&mut self, kind: ValueKind) -> Result<Vec<(f64, f64)>> {
        if let Some((reached, resume)) = self.take_pause() {
            reached.notify_one();
            resume.notified().await;
        }
        self.produce_values(kind)
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = true;
        state.log.reconnects += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frequencies_span_range() {
        let mut vna = SimulatedVna::new(11);
        vna.set_sweep(1_000_000, 2_000_000).await.unwrap();
        let freqs = vna.read_frequencies().await.unwrap();
        assert_eq!(freqs.len(), 11);
        assert_eq!(freqs[0], 1_000_000);
        assert_eq!(freqs[10], 2_000_000);
    }

    #[tokio::test]
    async fn test_faults_are_consumed() {
        let mut vna = SimulatedVna::new(5);
        vna.set_sweep(100, 500).await.unwrap();
        vna.inject_fault(ValueKind::S11, None, 2, FaultMode::ShortRead);

        assert_eq!(vna.read_values(ValueKind::S11).await.unwrap().len(), 4);
        assert_eq!(vna.read_values(ValueKind::S21).await.unwrap().len(), 5);
        assert_eq!(vna.read_values(ValueKind::S11).await.unwrap().len(), 4);
        assert_eq!(vna.read_values(ValueKind::S11).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_disconnected_reads_fail() {
        let mut vna = SimulatedVna::new(5);
        vna.disconnect();
        assert!(!vna.connected());
        assert!(vna.read_values(ValueKind::S11).await.is_err());
        vna.reconnect().await.unwrap();
        assert!(vna.connected());
        assert_eq!(vna.log().reconnects, 1);
    }
}
