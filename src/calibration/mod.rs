pub mod error_terms;

pub use error_terms::{ErrorTermCalibration, ErrorTerms, TwoPortTerms};

use log::warn;
use num_complex::Complex64;
use std::f64::consts::PI;

use crate::core::Datapoint;
use crate::error::{SweepError, SweepResult};

/// A solved error model that can de-embed raw ratios.
///
/// Implementations are built outside the sweep engine and must not change
/// while a sweep is running.
pub trait CalibrationModel: Send + Sync {
    /// Error terms have been solved
    fn is_calculated(&self) -> bool;

    /// Short/open/load data is complete
    fn is_valid_1port(&self) -> bool;

    /// Through/isolation data is complete in addition to one-port data
    fn is_valid_2port(&self) -> bool;

    /// One-port (3-term) reflection correction
    fn correct_s11(&self, dp: &Datapoint) -> Datapoint;

    /// Transmission correction; `dp11` must be the S11 point at the same frequency
    fn correct_s21(&self, dp: &Datapoint, dp11: &Datapoint) -> Datapoint;

    fn correct_delay(&self, dp: &Datapoint, delay: f64, reflect: bool) -> Datapoint {
        correct_delay(dp, delay, reflect)
    }
}

/// Remove the phase rotation of `delay` seconds of line.
///
/// Reflection traverses the line twice, so `reflect` doubles the rotation.
pub fn correct_delay(dp: &Datapoint, delay: f64, reflect: bool) -> Datapoint {
    if delay == 0.0 {
        return *dp;
    }
    let mult = if reflect { 2.0 } else { 1.0 };
    let rotation = Complex64::new(0.0, -2.0 * PI * dp.freq as f64 * delay * mult).exp();
    Datapoint::from_complex(dp.freq, dp.z() * rotation)
}

/// Always passes data through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncalibrated;

impl CalibrationModel for Uncalibrated {
    fn is_calculated(&self) -> bool {
        false
    }

    fn is_valid_1port(&self) -> bool {
        false
    }

    fn is_valid_2port(&self) -> bool {
        false
    }

    fn correct_s11(&self, dp: &Datapoint) -> Datapoint {
        *dp
    }

    fn correct_s21(&self, dp: &Datapoint, _dp11: &Datapoint) -> Datapoint {
        *dp
    }
}

/// Which correction a model can deliver right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMode {
    PassThrough,
    OnePort,
    TwoPort,
}

impl CorrectionMode {
    /// Classify a model, rejecting contradictory validity flags
    pub fn try_from_model(model: &dyn CalibrationModel) -> SweepResult<Self> {
        if !model.is_calculated() {
            return Ok(Self::PassThrough);
        }
        match (model.is_valid_1port(), model.is_valid_2port()) {
            (true, true) => Ok(Self::TwoPort),
            (true, false) => Ok(Self::OnePort),
            (false, two_port) => Err(SweepError::CalibrationInconsistent(format!(
                "calculated but one-port data invalid (two-port valid: {})",
                two_port
            ))),
        }
    }

    /// Classify a model, degrading contradictory flags to pass-through
    pub fn of(model: &dyn CalibrationModel) -> Self {
        Self::try_from_model(model).unwrap_or_else(|e| {
            warn!("{}; applying no correction", e);
            Self::PassThrough
        })
    }
}

/// Correction applied to every segment of one sweep
pub struct Corrector<'a> {
    model: &'a dyn CalibrationModel,
    mode: CorrectionMode,
    offset_delay: f64,
}

impl<'a> Corrector<'a> {
    pub fn new(model: &'a dyn CalibrationModel, offset_delay: f64) -> Self {
        Self {
            model,
            mode: CorrectionMode::of(model),
            offset_delay,
        }
    }

    pub fn mode(&self) -> CorrectionMode {
        self.mode
    }

    /// Correct one segment; `raw11[i]` and `raw21[i]` share a frequency
    pub fn apply(&self, raw11: &[Datapoint], raw21: &[Datapoint]) -> (Vec<Datapoint>, Vec<Datapoint>) {
        let mut data11: Vec<Datapoint> = match self.mode {
            CorrectionMode::PassThrough => raw11.to_vec(),
            CorrectionMode::OnePort | CorrectionMode::TwoPort => {
                raw11.iter().map(|dp| self.model.correct_s11(dp)).collect()
            }
        };

        let mut data21: Vec<Datapoint> = match self.mode {
            CorrectionMode::TwoPort => raw21
                .iter()
                .zip(raw11)
                .map(|(dp, dp11)| self.model.correct_s21(dp, dp11))
                .collect(),
            _ => raw21.to_vec(),
        };

        if self.offset_delay != 0.0 {
            for dp in data11.iter_mut() {
                *dp = self.model.correct_delay(dp, self.offset_delay, true);
            }
            for dp in data21.iter_mut() {
                *dp = self.model.correct_delay(dp, self.offset_delay, false);
            }
        }

        (data11, data21)
    }
}
