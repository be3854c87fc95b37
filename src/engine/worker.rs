use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::acquisition::{Acquisition, StopSignal};
use super::averaging::reduce;
use super::buffers::{SegmentData, SweepData};
use super::state::SweepState;
use crate::calibration::{CalibrationModel, Corrector};
use crate::core::rftools::corr_att_data;
use crate::core::Datapoint;
use crate::error::{SweepError, SweepResult};
use crate::hal::InstrumentLink;
use crate::observability::SweepMetrics;
use crate::sweep::{AcquisitionSettings, SweepMode, SweepPlan};

/// Notifications for sweep consumers
#[derive(Debug, Clone)]
pub enum SweepEvent {
    /// A segment was written to the shared buffers
    Updated { segment: usize, progress: u8 },
    /// A full sweep completed; in continuous mode another one follows
    Finished(Arc<SweepData>),
    Stopped,
    Error(String),
}

/// How a sweep ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed,
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the worker task and its handle
struct SweepShared {
    data: Mutex<Arc<SweepData>>,
    state: Mutex<SweepState>,
    error: Mutex<Option<String>>,
    completed_passes: AtomicUsize,
    total_passes: usize,
}

impl SweepShared {
    fn new(data: SweepData, total_passes: usize) -> Self {
        Self {
            data: Mutex::new(Arc::new(data)),
            state: Mutex::new(SweepState::Idle),
            error: Mutex::new(None),
            completed_passes: AtomicUsize::new(0),
            total_passes,
        }
    }

    fn snapshot(&self) -> Arc<SweepData> {
        lock(&self.data).clone()
    }

    /// Copy-on-write: readers holding an older generation keep it intact
    fn write_segment(&self, offset: usize, segment: &SegmentData) {
        let mut data = lock(&self.data);
        Arc::make_mut(&mut data).write_segment(offset, segment);
    }

    fn progress(&self) -> u8 {
        if self.total_passes == 0 {
            return 0;
        }
        let done = self.completed_passes.load(Ordering::Acquire);
        (done * 100 / self.total_passes).min(100) as u8
    }

    fn advance_pass(&self) {
        self.completed_passes.fetch_add(1, Ordering::AcqRel);
    }

    fn complete_segment(&self, segment: usize, passes: usize) {
        self.completed_passes.fetch_max((segment + 1) * passes, Ordering::AcqRel);
    }

    fn restart_progress(&self) {
        self.completed_passes.store(0, Ordering::Release);
    }

    fn state(&self) -> SweepState {
        lock(&self.state).clone()
    }

    fn transition(&self, next: SweepState) {
        let mut state = lock(&self.state);
        if !state.can_transition_to(&next) {
            warn!("Invalid sweep state transition: {} -> {}", state.name(), next.name());
            return;
        }
        *state = next;
    }

    fn segments_done(&self) -> usize {
        match *lock(&self.state) {
            SweepState::Running { segments_done, .. } => segments_done,
            _ => 0,
        }
    }

    fn set_error(&self, message: String) {
        *lock(&self.error) = Some(message);
    }

    /// Record a terminal error and leave the running state
    fn fail(&self, message: String) {
        self.set_error(message.clone());
        let mut state = lock(&self.state);
        if state.is_running() {
            *state = SweepState::Error { error_msg: message };
        }
    }

    fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }
}

/// Starts sweeps; one worker task per active sweep
pub struct SweepWorker {
    settings: AcquisitionSettings,
    metrics: Arc<SweepMetrics>,
}

impl SweepWorker {
    pub fn new(settings: AcquisitionSettings) -> Self {
        Self {
            settings,
            metrics: Arc::new(SweepMetrics::new()),
        }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    pub fn metrics(&self) -> Arc<SweepMetrics> {
        self.metrics.clone()
    }

    /// Spawn a sweep of `plan` on the current tokio runtime.
    ///
    /// Fails immediately if the plan is illegal or the instrument is not
    /// connected. The instrument is owned by the sweep until it ends.
    pub fn start(
        &self,
        plan: SweepPlan,
        calibration: Arc<dyn CalibrationModel>,
        instrument: Box<dyn InstrumentLink>,
    ) -> SweepResult<SweepHandle> {
        plan.check()?;
        if !instrument.connected() {
            debug!("Attempted to sweep without a connected instrument");
            return Err(SweepError::NotConnected);
        }

        let passes = plan.passes_per_segment();
        let shared = Arc::new(SweepShared::new(SweepData::placeholder(&plan), plan.segments * passes));
        shared.transition(SweepState::Running {
            start_time: Some(Instant::now()),
            segments_done: 0,
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        info!(
            "Starting {:?} sweep {} - {} Hz, {} segments of {} points, {} passes",
            plan.properties.mode, plan.start, plan.end, plan.segments, plan.points, passes
        );

        let runner = SweepRunner {
            plan,
            settings: self.settings.clone(),
            calibration,
            shared: shared.clone(),
            metrics: self.metrics.clone(),
            stop: StopSignal::new(stop_rx),
            events: event_tx,
        };
        let task = tokio::spawn(runner.run(instrument));

        Ok(SweepHandle {
            shared,
            stop_tx,
            events: event_rx,
            metrics: self.metrics.clone(),
            task: Some(task),
        })
    }
}

struct WorkerExit {
    outcome: SweepResult<SweepOutcome>,
    instrument: Box<dyn InstrumentLink>,
}

/// Leaves the running state if the sweep unwinds, e.g. from a panicking model
struct PanicGuard<'a> {
    shared: &'a SweepShared,
    events: &'a Sender<SweepEvent>,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("Sweep worker panicked");
            let message = "ERROR during sweep\n\nStopped\n\nSweep worker panicked".to_string();
            self.shared.fail(message.clone());
            let _ = self.events.send(SweepEvent::Error(message));
        }
    }
}

struct SweepRunner {
    plan: SweepPlan,
    settings: AcquisitionSettings,
    calibration: Arc<dyn CalibrationModel>,
    shared: Arc<SweepShared>,
    metrics: Arc<SweepMetrics>,
    stop: StopSignal,
    events: Sender<SweepEvent>,
}

impl SweepRunner {
    async fn run(self, mut instrument: Box<dyn InstrumentLink>) -> WorkerExit {
        let started = Instant::now();
        let guard = PanicGuard {
            shared: &self.shared,
            events: &self.events,
        };
        let result = self.sweep(instrument.as_mut()).await;
        drop(guard);

        let outcome = match result {
            Ok(sweeps) => {
                self.shared.transition(SweepState::Completed {
                    duration: Some(started.elapsed()),
                    sweeps,
                });
                Ok(SweepOutcome::Completed)
            }
            Err(SweepError::Cancelled) => {
                info!("Sweep stopped as signalled");
                self.shared.transition(SweepState::Stopped {
                    segments_done: self.shared.segments_done(),
                });
                let _ = self.events.send(SweepEvent::Stopped);
                Ok(SweepOutcome::Stopped)
            }
            Err(e) => {
                error!("Sweep failed: {}", e);
                let message = format!("ERROR during sweep\n\nStopped\n\n{}", e);
                self.shared.fail(message.clone());
                let _ = self.events.send(SweepEvent::Error(message));
                Err(e)
            }
        };

        WorkerExit { outcome, instrument }
    }

    /// Run sweeps until done, stopped or failed; returns completed sweeps
    async fn sweep(&self, instrument: &mut dyn InstrumentLink) -> SweepResult<u64> {
        let plan = &self.plan;
        let corrector = Corrector::new(self.calibration.as_ref(), self.settings.offset_delay);
        debug!("Calibration mode: {:?}", corrector.mode());

        let mut acquisition = Acquisition::new(instrument, &self.settings, &self.stop, &self.metrics);
        let passes = plan.passes_per_segment();
        let mut sweeps = 0u64;

        loop {
            self.shared.restart_progress();

            for segment in 0..plan.segments {
                if self.stop.is_stopped() {
                    debug!("Stopping sweep before segment {}", segment);
                    return Err(SweepError::Cancelled);
                }
                let data = self.acquire_segment(&mut acquisition, &corrector, segment, passes).await?;

                self.shared.write_segment(plan.segment_offset(segment), &data);
                self.shared.complete_segment(segment, passes);
                self.shared.transition(SweepState::Running {
                    start_time: None,
                    segments_done: segment + 1,
                });
                self.metrics.record_segment();

                let progress = self.shared.progress();
                debug!("Segment {} written, {}% done", segment, progress);
                let _ = self.events.send(SweepEvent::Updated { segment, progress });
            }

            if plan.segments > 1 {
                acquisition.reset_sweep(plan.start, plan.end).await;
            }

            sweeps += 1;
            self.metrics.record_sweep();
            let _ = self.events.send(SweepEvent::Finished(self.shared.snapshot()));

            if plan.properties.mode != SweepMode::Continuous {
                return Ok(sweeps);
            }
            if self.stop.is_stopped() {
                return Err(SweepError::Cancelled);
            }
            debug!("Restarting continuous sweep");
            tokio::task::yield_now().await;
        }
    }

    /// Read, average and correct one segment without touching shared state
    async fn acquire_segment(
        &self,
        acquisition: &mut Acquisition<'_>,
        corrector: &Corrector<'_>,
        segment: usize,
        passes: usize,
    ) -> SweepResult<SegmentData> {
        let plan = &self.plan;
        let (start, stop) = plan.index_range(segment);
        info!("Reading from {} to {}. Averaging {} values", start, stop, passes);

        acquisition.set_sweep(segment, start, stop).await?;

        let mut frequencies: Option<Vec<u64>> = None;
        let mut values11 = Vec::with_capacity(passes);
        let mut values21 = Vec::with_capacity(passes);

        for pass in 0..passes {
            if self.stop.is_stopped() {
                if pass > 0 {
                    warn!("Stop during average. Discarding segment {}", segment);
                }
                return Err(SweepError::Cancelled);
            }
            debug!("Reading average no {} / {}", pass + 1, passes);
            let read = acquisition.read_pass(segment, plan.points).await?;

            match &frequencies {
                Some(first) if *first != read.frequencies => {
                    return Err(SweepError::Protocol {
                        segment,
                        reason: format!("frequencies changed between passes 1 and {}", pass + 1),
                    });
                }
                Some(_) => {}
                None => frequencies = Some(read.frequencies),
            }
            values11.push(read.s11);
            values21.push(read.s21);
            self.shared.advance_pass();
        }

        let truncate = if passes > 1 { plan.truncate() } else { 0 };
        if truncate > 0 {
            debug!("Truncating {} values by {}", passes, truncate);
        }
        let s11 = reduce(&values11, truncate);
        let s21 = reduce(&values21, truncate);

        let frequencies = frequencies.unwrap_or_default();
        let raw_s11: Vec<Datapoint> = frequencies
            .iter()
            .zip(&s11)
            .map(|(&f, &z)| Datapoint::from_complex(f, z))
            .collect();
        let raw_s21: Vec<Datapoint> = frequencies
            .iter()
            .zip(&s21)
            .map(|(&f, &z)| Datapoint::from_complex(f, z))
            .collect();

        let (s11, mut s21) = corrector.apply(&raw_s11, &raw_s21);
        if self.settings.s21_attenuation > 0.0 {
            s21 = corr_att_data(&s21, self.settings.s21_attenuation);
        }

        Ok(SegmentData {
            s11,
            s21,
            raw_s11,
            raw_s21,
        })
    }
}

/// Control and read access to one running sweep.
///
/// Dropping the handle requests a stop.
pub struct SweepHandle {
    shared: Arc<SweepShared>,
    stop_tx: watch::Sender<bool>,
    events: Receiver<SweepEvent>,
    metrics: Arc<SweepMetrics>,
    task: Option<JoinHandle<WorkerExit>>,
}

impl SweepHandle {
    /// Request a cooperative stop; an in-flight read is allowed to finish
    pub fn stop(&self) {
        info!("Stop requested");
        self.stop_tx.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().is_running()
    }

    pub fn state(&self) -> SweepState {
        self.shared.state()
    }

    /// 0..=100, never decreasing within one sweep
    pub fn progress(&self) -> u8 {
        self.shared.progress()
    }

    /// Current generation of all four buffers
    pub fn data(&self) -> Arc<SweepData> {
        self.shared.snapshot()
    }

    /// Corrected (S11, S21) of the current generation
    pub fn snapshot(&self) -> (Vec<Datapoint>, Vec<Datapoint>) {
        self.shared.snapshot().corrected()
    }

    /// Last terminal error message
    pub fn error(&self) -> Option<String> {
        self.shared.error()
    }

    pub fn events(&self) -> Receiver<SweepEvent> {
        self.events.clone()
    }

    pub fn metrics(&self) -> Arc<SweepMetrics> {
        self.metrics.clone()
    }

    /// Wait for the worker and take the instrument back.
    ///
    /// The handle stays readable afterwards.
    pub async fn join(&mut self) -> (SweepResult<SweepOutcome>, Option<Box<dyn InstrumentLink>>) {
        let Some(task) = self.task.take() else {
            return (Err(SweepError::Worker("sweep already joined".to_string())), None);
        };
        match task.await {
            Ok(exit) => (exit.outcome, Some(exit.instrument)),
            Err(e) => {
                let message = format!("Sweep worker terminated: {}", e);
                self.shared.fail(message.clone());
                (Err(SweepError::Worker(message)), None)
            }
        }
    }

    pub async fn wait(&mut self) -> SweepResult<SweepOutcome> {
        self.join().await.0
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.stop_tx.send_replace(true);
        }
    }
}
