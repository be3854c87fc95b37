use log::{debug, error, warn};
use num_complex::Complex64;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{SweepError, SweepResult};
use crate::hal::{InstrumentLink, ValueKind};
use crate::observability::SweepMetrics;
use crate::resilience::{RetryMachine, RetryState};
use crate::sweep::AcquisitionSettings;

/// Cooperative stop flag shared by the handle and the worker
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `delay`, waking early if a stop is requested
    pub async fn sleep(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_requested(self.rx.clone()) => {}
        }
    }
}

async fn stop_requested(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // handle dropped, nobody can stop us any more
            std::future::pending::<()>().await;
        }
    }
}

/// One raw read of a segment
#[derive(Debug, Clone)]
pub struct Pass {
    pub frequencies: Vec<u64>,
    pub s11: Vec<Complex64>,
    pub s21: Vec<Complex64>,
}

#[derive(Debug, Clone, Copy)]
enum Request {
    SetSweep { start: u64, stop: u64 },
    Frequencies,
    Values(ValueKind),
}

impl Request {
    fn describe(&self) -> String {
        match self {
            Self::SetSweep { start, stop } => format!("sweep {} {}", start, stop),
            Self::Frequencies => "frequencies".to_string(),
            Self::Values(kind) => kind.command().to_string(),
        }
    }
}

enum Response {
    Done,
    Frequencies(Vec<u64>),
    Values(Vec<Complex64>),
}

enum AttemptError {
    Retry(String),
    Fatal(SweepError),
}

/// Bounded, validated instrument reads for one sweep
pub struct Acquisition<'a> {
    instrument: &'a mut dyn InstrumentLink,
    settings: &'a AcquisitionSettings,
    stop: &'a StopSignal,
    metrics: &'a SweepMetrics,
}

impl<'a> Acquisition<'a> {
    pub fn new(
        instrument: &'a mut dyn InstrumentLink,
        settings: &'a AcquisitionSettings,
        stop: &'a StopSignal,
        metrics: &'a SweepMetrics,
    ) -> Self {
        Self {
            instrument,
            settings,
            stop,
            metrics,
        }
    }

    pub async fn set_sweep(&mut self, segment: usize, start: u64, stop: u64) -> SweepResult<()> {
        debug!("Setting sweep range to {} to {}", start, stop);
        self.run(Request::SetSweep { start, stop }, segment, 0).await?;
        Ok(())
    }

    /// Read frequencies, S11 and S21 once
    pub async fn read_pass(&mut self, segment: usize, points: usize) -> SweepResult<Pass> {
        let frequencies = match self.run(Request::Frequencies, segment, points).await? {
            Response::Frequencies(f) => f,
            _ => return Err(unexpected(segment)),
        };
        let s11 = match self.run(Request::Values(ValueKind::S11), segment, frequencies.len()).await? {
            Response::Values(v) => v,
            _ => return Err(unexpected(segment)),
        };
        let s21 = match self.run(Request::Values(ValueKind::S21), segment, frequencies.len()).await? {
            Response::Values(v) => v,
            _ => return Err(unexpected(segment)),
        };
        Ok(Pass {
            frequencies,
            s11,
            s21,
        })
    }

    /// Best-effort restore of the instrument's full range
    pub async fn reset_sweep(&mut self, start: u64, stop: u64) {
        debug!("Resetting instrument sweep to full range: {} to {}", start, stop);
        if let Err(e) = self.instrument.reset_sweep(start, stop).await {
            warn!("Failed to reset sweep range: {:#}", e);
        }
    }

    async fn run(&mut self, request: Request, segment: usize, expected: usize) -> SweepResult<Response> {
        let mut machine = RetryMachine::new(self.settings.retry.clone());
        let mut last_failure = String::new();

        loop {
            match machine.state() {
                RetryState::Reading { attempt } => match self.perform(request, segment, expected).await {
                    Ok(response) => {
                        if attempt > 1 {
                            debug!("Read {} after {} attempts", request.describe(), attempt);
                        }
                        return Ok(response);
                    }
                    Err(AttemptError::Fatal(e)) => return Err(e),
                    Err(AttemptError::Retry(reason)) => {
                        self.metrics.record_failed_read();
                        warn!("Attempt {} reading {} failed: {}", attempt, request.describe(), reason);
                        last_failure = reason;
                        machine.on_failure();
                    }
                },
                RetryState::Retrying { delay, .. } => {
                    if self.stop.is_stopped() {
                        return Err(SweepError::Cancelled);
                    }
                    self.metrics.record_retry(delay);
                    self.stop.sleep(delay).await;
                    if self.stop.is_stopped() {
                        return Err(SweepError::Cancelled);
                    }
                    machine.begin();
                }
                RetryState::Reconnecting { .. } => {
                    if self.stop.is_stopped() {
                        return Err(SweepError::Cancelled);
                    }
                    warn!("Reconnecting instrument after {} failed reads", machine.attempts());
                    self.metrics.record_reconnect();
                    if let Err(e) = self.instrument.reconnect().await {
                        warn!("Reconnect failed: {:#}", e);
                    }
                    machine.on_reconnected();
                }
                RetryState::Failed { attempts } => {
                    error!(
                        "Tried and failed to read {} {} times. Giving up.",
                        request.describe(),
                        attempts
                    );
                    return Err(SweepError::Acquisition {
                        what: request.describe(),
                        attempts,
                        last: last_failure,
                    });
                }
            }
        }
    }

    async fn perform(&mut self, request: Request, segment: usize, expected: usize) -> Result<Response, AttemptError> {
        let started = self.metrics.start_read();
        let result = match request {
            Request::SetSweep { start, stop } => self.instrument.set_sweep(start, stop).await.map(|_| Response::Done),
            Request::Frequencies => self.instrument.read_frequencies().await.map(Response::Frequencies),
            Request::Values(kind) => self.instrument.read_values(kind).await.and_then(|raw| {
                match self.settings.validation.check(&raw, expected) {
                    Some(reason) => Err(SweepError::invalid_values(kind, reason).into()),
                    None => Ok(Response::Values(
                        raw.into_iter().map(|(re, im)| Complex64::new(re, im)).collect(),
                    )),
                }
            }),
        };
        self.metrics.finish_read(started);

        match result {
            Ok(Response::Frequencies(frequencies)) if frequencies.len() != expected => {
                Err(AttemptError::Fatal(SweepError::Protocol {
                    segment,
                    reason: format!("requested {} points, instrument reported {}", expected, frequencies.len()),
                }))
            }
            Ok(response) => Ok(response),
            Err(e) => Err(AttemptError::Retry(format!("{:#}", e))),
        }
    }
}

fn unexpected(segment: usize) -> SweepError {
    SweepError::Protocol {
        segment,
        reason: "unexpected response".to_string(),
    }
}
