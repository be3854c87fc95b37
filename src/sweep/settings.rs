use serde::{Deserialize, Serialize};

use super::SweepPlan;
use crate::resilience::RetryPolicy;

/// Plausibility check applied to every raw value read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub enabled: bool,
    /// Largest accepted |re| or |im|
    pub value_max: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            value_max: 9.5,
        }
    }
}

impl ValidationSettings {
    /// Reason a value list is rejected, if any
    pub fn check(&self, values: &[(f64, f64)], expected_len: usize) -> Option<String> {
        if values.len() != expected_len {
            return Some(format!("expected {} values, got {}", expected_len, values.len()));
        }
        if !self.enabled {
            return None;
        }
        values
            .iter()
            .position(|&(re, im)| {
                !re.is_finite() || !im.is_finite() || re.abs() > self.value_max || im.abs() > self.value_max
            })
            .map(|idx| {
                let (re, im) = values[idx];
                format!("value {} at index {} outside ±{}", num_complex::Complex64::new(re, im), idx, self.value_max)
            })
    }
}

/// Engine settings that stay fixed for one sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AcquisitionSettings {
    pub retry: RetryPolicy,
    pub validation: ValidationSettings,
    /// Electrical delay removed from corrected data, in seconds
    pub offset_delay: f64,
    /// Attenuator in front of port 2, in dB
    pub s21_attenuation: f64,
}

/// Persisted sweep configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub version: String,
    pub name: String,
    pub plan: SweepPlan,
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
}

impl SweepSettings {
    pub fn new(name: impl Into<String>, plan: SweepPlan) -> Self {
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            plan,
            acquisition: AcquisitionSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_bounds() {
        let validation = ValidationSettings::default();
        assert!(validation.check(&[(0.5, -0.5), (9.5, 9.5)], 2).is_none());
        assert!(validation.check(&[(0.5, -0.5)], 2).is_some());
        assert!(validation.check(&[(0.5, -9.6)], 1).is_some());
        assert!(validation.check(&[(f64::NAN, 0.0)], 1).is_some());

        let disabled = ValidationSettings {
            enabled: false,
            ..Default::default()
        };
        assert!(disabled.check(&[(100.0, 0.0)], 1).is_none());
        assert!(disabled.check(&[], 1).is_some());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: SweepSettings = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "name": "hf",
            "plan": {"start": 1000000, "end": 30000000}
        }))
        .unwrap();
        assert_eq!(settings.plan.points, 101);
        assert_eq!(settings.acquisition.retry.max_attempts, 10);
        assert_eq!(settings.acquisition.validation.value_max, 9.5);
    }
}
