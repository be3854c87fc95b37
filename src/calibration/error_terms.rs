use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::CalibrationModel;
use crate::core::Datapoint;

/// Forward two-port error terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoPortTerms {
    /// Forward reflection tracking
    pub e10e01: Complex64,
    /// Forward isolation
    pub e30: Complex64,
    /// Port 2 match
    pub e22: Complex64,
    /// Forward transmission tracking
    pub e10e32: Complex64,
}

impl TwoPortTerms {
    pub fn identity() -> Self {
        Self {
            e10e01: Complex64::new(1.0, 0.0),
            e30: Complex64::new(0.0, 0.0),
            e22: Complex64::new(0.0, 0.0),
            e10e32: Complex64::new(1.0, 0.0),
        }
    }
}

/// Solved error terms at one calibration frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorTerms {
    pub freq: u64,
    /// Directivity
    pub e00: Complex64,
    /// Port 1 match
    pub e11: Complex64,
    pub delta_e: Complex64,
    #[serde(default)]
    pub two_port: Option<TwoPortTerms>,
}

impl ErrorTerms {
    /// Terms that leave a raw ratio unchanged
    pub fn identity(freq: u64) -> Self {
        Self {
            freq,
            e00: Complex64::new(0.0, 0.0),
            e11: Complex64::new(0.0, 0.0),
            delta_e: Complex64::new(-1.0, 0.0),
            two_port: None,
        }
    }

    pub fn with_two_port(mut self, terms: TwoPortTerms) -> Self {
        self.two_port = Some(terms);
        self
    }
}

/// Calibration from externally solved per-frequency error terms.
///
/// Terms are linearly interpolated between calibration frequencies and held
/// at the edge values outside the calibrated range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "StoredCalibration")]
pub struct ErrorTermCalibration {
    pub source: String,
    terms: Vec<ErrorTerms>,
}

/// On-disk form; files may list terms in any order
#[derive(Deserialize)]
struct StoredCalibration {
    #[serde(default)]
    source: String,
    terms: Vec<ErrorTerms>,
}

impl From<StoredCalibration> for ErrorTermCalibration {
    fn from(stored: StoredCalibration) -> Self {
        Self::new(stored.source, stored.terms)
    }
}

impl ErrorTermCalibration {
    pub fn new(source: impl Into<String>, mut terms: Vec<ErrorTerms>) -> Self {
        terms.sort_by_key(|t| t.freq);
        terms.dedup_by_key(|t| t.freq);
        Self {
            source: source.into(),
            terms,
        }
    }

    pub fn terms(&self) -> &[ErrorTerms] {
        &self.terms
    }

    pub fn size(&self) -> usize {
        self.terms.len()
    }

    /// Interpolate one coefficient at `freq`
    fn interpolate<F>(&self, freq: u64, coefficient: F) -> Complex64
    where
        F: Fn(&ErrorTerms) -> Complex64,
    {
        let idx = self.terms.partition_point(|t| t.freq < freq);
        if idx == 0 {
            return coefficient(&self.terms[0]);
        }
        if idx == self.terms.len() {
            return coefficient(&self.terms[idx - 1]);
        }

        let hi = &self.terms[idx];
        if hi.freq == freq {
            return coefficient(hi);
        }
        let lo = &self.terms[idx - 1];
        let t = (freq - lo.freq) as f64 / (hi.freq - lo.freq) as f64;
        let a = coefficient(lo);
        a + (coefficient(hi) - a) * t
    }

    fn two_port_term<F>(&self, freq: u64, term: F) -> Complex64
    where
        F: Fn(&TwoPortTerms) -> Complex64,
    {
        self.interpolate(freq, |t| {
            t.two_port.as_ref().map(&term).unwrap_or(Complex64::new(0.0, 0.0))
        })
    }
}

impl CalibrationModel for ErrorTermCalibration {
    fn is_calculated(&self) -> bool {
        !self.terms.is_empty()
    }

    fn is_valid_1port(&self) -> bool {
        !self.terms.is_empty()
    }

    fn is_valid_2port(&self) -> bool {
        self.is_valid_1port() && self.terms.iter().all(|t| t.two_port.is_some())
    }

    fn correct_s11(&self, dp: &Datapoint) -> Datapoint {
        if !self.is_valid_1port() {
            return *dp;
        }
        let e00 = self.interpolate(dp.freq, |t| t.e00);
        let e11 = self.interpolate(dp.freq, |t| t.e11);
        let delta_e = self.interpolate(dp.freq, |t| t.delta_e);

        let s11 = (dp.z() - e00) / (dp.z() * e11 - delta_e);
        Datapoint::from_complex(dp.freq, s11)
    }

    fn correct_s21(&self, dp: &Datapoint, dp11: &Datapoint) -> Datapoint {
        if !self.is_valid_2port() {
            return *dp;
        }
        let e11 = self.interpolate(dp.freq, |t| t.e11);
        let delta_e = self.interpolate(dp.freq, |t| t.delta_e);
        let e30 = self.two_port_term(dp.freq, |t| t.e30);
        let e10e32 = self.two_port_term(dp.freq, |t| t.e10e32);
        let e10e01 = self.two_port_term(dp.freq, |t| t.e10e01);

        let s21 = (dp.z() - e30) / e10e32 * (e10e01 / (e11 * dp11.z() - delta_e));
        Datapoint::from_complex(dp.freq, s21)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lossy_terms(freq: u64) -> ErrorTerms {
        ErrorTerms {
            freq,
            e00: Complex64::new(0.05, 0.01),
            e11: Complex64::new(0.1, -0.02),
            delta_e: Complex64::new(-0.9, 0.05),
            two_port: None,
        }
    }

    #[test]
    fn test_identity_terms_pass_through() {
        let cal = ErrorTermCalibration::new(
            "identity",
            vec![ErrorTerms::identity(1_000_000).with_two_port(TwoPortTerms::identity())],
        );
        assert!(cal.is_valid_2port());

        let dp11 = Datapoint::new(1_000_000, 0.3, 0.4);
        let dp21 = Datapoint::new(1_000_000, 0.7, -0.1);
        let c11 = cal.correct_s11(&dp11);
        let c21 = cal.correct_s21(&dp21, &dp11);
        assert!((c11.z() - dp11.z()).norm() < 1e-12);
        assert!((c21.z() - dp21.z()).norm() < 1e-12);
    }

    #[test]
    fn test_one_port_inverts_error_model() {
        let terms = lossy_terms(10_000_000);
        let cal = ErrorTermCalibration::new("lossy", vec![terms]);

        // forward model: m = e00 + (e10e01 * a) / (1 - e11 * a), e10e01 = e00*e11 - delta_e
        let actual = Complex64::new(0.2, -0.3);
        let e10e01 = terms.e00 * terms.e11 - terms.delta_e;
        let measured = terms.e00 + e10e01 * actual / (Complex64::new(1.0, 0.0) - terms.e11 * actual);

        let corrected = cal.correct_s11(&Datapoint::from_complex(10_000_000, measured));
        assert!((corrected.z() - actual).norm() < 1e-12);
    }

    #[test]
    fn test_two_port_transmission_formula() {
        let terms = ErrorTerms {
            freq: 5_000_000,
            e00: Complex64::new(0.1, 0.0),
            e11: Complex64::new(0.2, 0.0),
            delta_e: Complex64::new(-0.5, 0.0),
            two_port: Some(TwoPortTerms {
                e10e01: Complex64::new(0.8, 0.0),
                e30: Complex64::new(0.01, 0.0),
                e22: Complex64::new(0.0, 0.0),
                e10e32: Complex64::new(0.5, 0.0),
            }),
        };
        let cal = ErrorTermCalibration::new("two-port", vec![terms]);

        // (0.3 - 0.01) / 0.5 * 0.8 / (0.2 * 0.4 + 0.5) = 0.58 * 0.8 / 0.58
        let dp21 = Datapoint::new(5_000_000, 0.3, 0.0);
        let c21 = cal.correct_s21(&dp21, &Datapoint::new(5_000_000, 0.4, 0.0));
        assert!((c21.z() - Complex64::new(0.8, 0.0)).norm() < 1e-12);

        // the reflection at the same frequency enters the denominator
        let other = cal.correct_s21(&dp21, &Datapoint::new(5_000_000, 0.9, 0.0));
        assert!((other.z() - Complex64::new(0.58 * 0.8 / 0.68, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_interpolation_is_linear_and_clamped() {
        let mut lo = ErrorTerms::identity(1_000);
        lo.e00 = Complex64::new(0.0, 0.0);
        let mut hi = ErrorTerms::identity(2_000);
        hi.e00 = Complex64::new(1.0, 0.0);
        let cal = ErrorTermCalibration::new("interp", vec![hi, lo]);

        assert_eq!(cal.interpolate(1_500, |t| t.e00), Complex64::new(0.5, 0.0));
        assert_eq!(cal.interpolate(500, |t| t.e00), Complex64::new(0.0, 0.0));
        assert_eq!(cal.interpolate(5_000, |t| t.e00), Complex64::new(1.0, 0.0));
        assert_eq!(cal.terms()[0].freq, 1_000);
    }

    #[test]
    fn test_empty_calibration_is_not_calculated() {
        let cal = ErrorTermCalibration::default();
        assert!(!cal.is_calculated());
        let dp = Datapoint::new(1, 0.5, 0.5);
        assert_eq!(cal.correct_s11(&dp), dp);
    }

    #[test]
    fn test_serde_round_trip_keeps_terms() {
        let cal = ErrorTermCalibration::new("file", vec![lossy_terms(1), lossy_terms(2)]);
        let json = serde_json::to_string(&cal).unwrap();
        let loaded: ErrorTermCalibration = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.terms(), cal.terms());
        assert!(!loaded.is_valid_2port());
    }
}
