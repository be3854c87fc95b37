//! Conversions between reflection ratios, impedances and lumped equivalents.

use num_complex::Complex64;
use std::f64::consts::{PI, TAU};

use super::Datapoint;

/// Impedance from a reflection coefficient: `Z0·(1+Γ)/(1−Γ)`.
///
/// Returns a real +inf for Γ = 1 (open circuit).
pub fn gamma_to_impedance(gamma: Complex64, ref_impedance: f64) -> Complex64 {
    let denominator = Complex64::new(1.0, 0.0) - gamma;
    if denominator == Complex64::new(0.0, 0.0) {
        return Complex64::new(f64::INFINITY, 0.0);
    }
    (Complex64::new(1.0, 0.0) + gamma) / denominator * ref_impedance
}

pub fn reflection_coefficient(z: Complex64, ref_impedance: f64) -> Complex64 {
    (z - ref_impedance) / (z + ref_impedance)
}

pub fn impedance_to_norm(z: Complex64, ref_impedance: f64) -> Complex64 {
    z / ref_impedance
}

pub fn norm_to_impedance(z: Complex64, ref_impedance: f64) -> Complex64 {
    z * ref_impedance
}

/// Capacitance equivalent to the reactance of `z` at `freq`
pub fn impedance_to_capacitance(z: Complex64, freq: f64) -> f64 {
    if freq == 0.0 {
        return f64::NEG_INFINITY;
    }
    if z.im == 0.0 {
        return f64::INFINITY;
    }
    -(1.0 / (freq * 2.0 * PI * z.im))
}

/// Inductance equivalent to the reactance of `z` at `freq`
pub fn impedance_to_inductance(z: Complex64, freq: f64) -> f64 {
    if freq == 0.0 {
        return 0.0;
    }
    z.im / (freq * 2.0 * PI)
}

pub fn parallel_to_serial(z: Complex64) -> Complex64 {
    let mut sq_sum = z.re * z.re + z.im * z.im;
    if sq_sum == 0.0 {
        sq_sum = 10.0e-30;
    }
    Complex64::new(
        z.re * z.im * z.im / sq_sum,
        z.re * z.re * z.im / sq_sum,
    )
}

pub fn serial_to_parallel(z: Complex64) -> Complex64 {
    let sq_sum = z.re * z.re + z.im * z.im;
    if z.re == 0.0 && z.im == 0.0 {
        return Complex64::new(f64::INFINITY, f64::INFINITY);
    }
    if z.im == 0.0 {
        return Complex64::new(sq_sum / z.re, f64::INFINITY.copysign(sq_sum));
    }
    if z.re == 0.0 {
        return Complex64::new(f64::INFINITY.copysign(sq_sum), sq_sum / z.im);
    }
    Complex64::new(sq_sum / z.re, sq_sum / z.im)
}

/// Group delay in seconds at `index`, from the phase slope of its neighbours
pub fn group_delay(data: &[Datapoint], index: usize) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let last = data.len() - 1;
    let idx0 = index.saturating_sub(1).min(last);
    let idx1 = (index + 1).min(last);

    let delta_angle = data[idx1].phase() - data[idx0].phase();
    let delta_freq = data[idx1].freq as f64 - data[idx0].freq as f64;
    if delta_freq == 0.0 {
        0.0
    } else {
        -delta_angle / TAU / delta_freq
    }
}

/// Compensate an attenuator of `att_db` dB in front of the S21 port
pub fn corr_att_data(data: &[Datapoint], att_db: f64) -> Vec<Datapoint> {
    if att_db <= 0.0 {
        return data.to_vec();
    }
    let att = 10f64.powf(att_db / 20.0);
    data.iter()
        .map(|dp| Datapoint::from_complex(dp.freq, dp.z() * att))
        .collect()
}
