use num_complex::Complex64;
use std::sync::Mutex;
use vnasweep::calibration::{
    correct_delay, CalibrationModel, CorrectionMode, Corrector, ErrorTermCalibration, ErrorTerms, TwoPortTerms,
    Uncalibrated,
};
use vnasweep::core::Datapoint;

fn raw(n: u64) -> Vec<Datapoint> {
    (0..n)
        .map(|i| Datapoint::new(1_000_000 + i * 1_000, 0.1 * i as f64, -0.05 * i as f64))
        .collect()
}

/// Two-port model that records which S11 point each S21 correction saw
#[derive(Default)]
struct RecordingModel {
    seen: Mutex<Vec<(u64, u64)>>,
}

impl CalibrationModel for RecordingModel {
    fn is_calculated(&self) -> bool {
        true
    }
    fn is_valid_1port(&self) -> bool {
        true
    }
    fn is_valid_2port(&self) -> bool {
        true
    }
    fn correct_s11(&self, dp: &Datapoint) -> Datapoint {
        Datapoint::new(dp.freq, dp.re + 1.0, dp.im)
    }
    fn correct_s21(&self, dp: &Datapoint, dp11: &Datapoint) -> Datapoint {
        self.seen.lock().unwrap().push((dp.freq, dp11.freq));
        // raw S11 has re < 1, corrected S11 has re >= 1
        assert!(dp11.re < 1.0);
        *dp
    }
}

#[test]
fn test_uncalibrated_is_bit_exact() {
    let model = Uncalibrated;
    for dp in raw(5) {
        assert_eq!(model.correct_s11(&dp), dp);
        assert_eq!(model.correct_s21(&dp, &dp), dp);
    }
}

#[test]
fn test_delay_zero_is_identity() {
    let dp = Datapoint::new(50_000_000, -0.2, 0.9);
    assert_eq!(correct_delay(&dp, 0.0, true), dp);
    assert_eq!(correct_delay(&dp, 0.0, false), dp);
    assert_eq!(Uncalibrated.correct_delay(&dp, 0.0, true), dp);
}

#[test]
fn test_two_port_pairs_matching_frequency() {
    let model = RecordingModel::default();
    let corrector = Corrector::new(&model, 0.0);
    assert_eq!(corrector.mode(), CorrectionMode::TwoPort);

    let data11 = raw(4);
    let data21 = raw(4);
    let (s11, _) = corrector.apply(&data11, &data21);

    assert!(s11.iter().all(|dp| dp.re >= 1.0));
    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|(f21, f11)| f21 == f11));
}

#[test]
fn test_delay_applied_to_every_point() {
    let corrector = Corrector::new(&Uncalibrated, 2e-9);
    let data = raw(6);
    let (s11, s21) = corrector.apply(&data, &data);

    for (i, dp) in data.iter().enumerate() {
        assert_eq!(s11[i], correct_delay(dp, 2e-9, true));
        assert_eq!(s21[i], correct_delay(dp, 2e-9, false));
    }
}

#[test]
fn test_error_terms_interpolate_and_clamp() {
    let cal = ErrorTermCalibration::new(
        "interp",
        vec![
            ErrorTerms {
                e00: Complex64::new(0.2, 0.0),
                ..ErrorTerms::identity(2_000_000)
            },
            ErrorTerms {
                e00: Complex64::new(0.0, 0.0),
                ..ErrorTerms::identity(1_000_000)
            },
        ],
    );
    assert_eq!(cal.terms()[0].freq, 1_000_000);

    let m = Complex64::new(0.5, 0.0);
    let mid = cal.correct_s11(&Datapoint::from_complex(1_500_000, m));
    assert!((mid.z() - Complex64::new(0.4, 0.0)).norm() < 1e-12);

    let below = cal.correct_s11(&Datapoint::from_complex(500_000, m));
    assert!((below.z() - m).norm() < 1e-12);
    let above = cal.correct_s11(&Datapoint::from_complex(9_000_000, m));
    assert!((above.z() - Complex64::new(0.3, 0.0)).norm() < 1e-12);
}

#[test]
fn test_empty_calibration_passes_through() {
    let cal = ErrorTermCalibration::new("empty", Vec::new());
    assert!(!cal.is_calculated());
    assert_eq!(CorrectionMode::of(&cal), CorrectionMode::PassThrough);
}

#[test]
fn test_error_terms_load_from_json() {
    let terms = vec![
        ErrorTerms::identity(1_000_000).with_two_port(TwoPortTerms::identity()),
        ErrorTerms::identity(2_000_000).with_two_port(TwoPortTerms::identity()),
    ];
    let json = serde_json::to_string(&ErrorTermCalibration::new("saved", terms)).unwrap();
    let loaded: ErrorTermCalibration = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded.size(), 2);
    assert_eq!(loaded.source, "saved");
    assert!(loaded.is_valid_2port());
}

#[test]
fn test_unsorted_calibration_file_is_ordered_on_load() {
    let json = r#"{
        "source": "unsorted",
        "terms": [
            {"freq": 2000000, "e00": [0.2, 0.0], "e11": [0.0, 0.0], "delta_e": [-1.0, 0.0]},
            {"freq": 1000000, "e00": [0.0, 0.0], "e11": [0.0, 0.0], "delta_e": [-1.0, 0.0]},
            {"freq": 2000000, "e00": [0.9, 0.0], "e11": [0.0, 0.0], "delta_e": [-1.0, 0.0]}
        ]
    }"#;
    let loaded: ErrorTermCalibration = serde_json::from_str(json).unwrap();

    assert_eq!(loaded.size(), 2);
    assert_eq!(loaded.terms()[0].freq, 1_000_000);

    let corrected = loaded.correct_s11(&Datapoint::new(1_500_000, 0.5, 0.0));
    assert!((corrected.z() - Complex64::new(0.4, 0.0)).norm() < 1e-12, "got {}", corrected.z());
}

#[test]
fn test_two_port_correction_uses_matching_reflection() {
    let cal = ErrorTermCalibration::new(
        "two-port",
        vec![ErrorTerms {
            e00: Complex64::new(0.1, 0.0),
            e11: Complex64::new(0.2, 0.0),
            delta_e: Complex64::new(-0.5, 0.0),
            ..ErrorTerms::identity(5_000_000)
        }
        .with_two_port(TwoPortTerms {
            e10e01: Complex64::new(0.8, 0.0),
            e30: Complex64::new(0.01, 0.0),
            e22: Complex64::new(0.0, 0.0),
            e10e32: Complex64::new(0.5, 0.0),
        })],
    );
    let corrector = Corrector::new(&cal, 0.0);
    assert_eq!(corrector.mode(), CorrectionMode::TwoPort);

    let raw11 = vec![Datapoint::new(5_000_000, 0.4, 0.0), Datapoint::new(5_000_000, 0.9, 0.0)];
    let raw21 = vec![Datapoint::new(5_000_000, 0.3, 0.0); 2];
    let (_, s21) = corrector.apply(&raw11, &raw21);

    assert!((s21[0].z() - Complex64::new(0.8, 0.0)).norm() < 1e-12);
    assert!((s21[1].z() - Complex64::new(0.58 * 0.8 / 0.68, 0.0)).norm() < 1e-12);
}
