use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::rftools::{gamma_to_impedance, impedance_to_capacitance, impedance_to_inductance};

/// Speed of light in m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Default reference impedance in ohms
pub const Z0: f64 = 50.0;

/// One measured frequency point: frequency plus complex ratio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Frequency in Hz
    pub freq: u64,
    pub re: f64,
    pub im: f64,
}

impl Datapoint {
    pub fn new(freq: u64, re: f64, im: f64) -> Self {
        Self { freq, re, im }
    }

    pub fn from_complex(freq: u64, z: Complex64) -> Self {
        Self::new(freq, z.re, z.im)
    }

    /// Zero-valued point used to pre-fill sweep buffers
    pub fn placeholder(freq: u64) -> Self {
        Self::new(freq, 0.0, 0.0)
    }

    /// The ratio as a complex number
    pub fn z(&self) -> Complex64 {
        Complex64::new(self.re, self.im)
    }

    pub fn phase(&self) -> f64 {
        self.z().arg()
    }

    /// Magnitude in dB, -inf for a zero ratio
    pub fn gain(&self) -> f64 {
        let mag = self.z().norm();
        if mag > 0.0 {
            20.0 * mag.log10()
        } else {
            f64::NEG_INFINITY
        }
    }

    pub fn vswr(&self) -> f64 {
        let mag = self.z().norm();
        if mag < 1.0 {
            (1.0 + mag) / (1.0 - mag)
        } else {
            f64::INFINITY
        }
    }

    pub fn wavelength(&self) -> f64 {
        if self.freq == 0 {
            f64::INFINITY
        } else {
            SPEED_OF_LIGHT / self.freq as f64
        }
    }

    /// Impedance seen through a reflection ratio for reference impedance `ref_impedance`
    pub fn impedance(&self, ref_impedance: f64) -> Complex64 {
        gamma_to_impedance(self.z(), ref_impedance)
    }

    /// Impedance of a shunt DUT measured as transmission
    pub fn shunt_impedance(&self, ref_impedance: f64) -> Complex64 {
        let z = self.z();
        let denominator = Complex64::new(1.0, 0.0) - z;
        if denominator == Complex64::new(0.0, 0.0) {
            return Complex64::new(f64::INFINITY, 0.0);
        }
        0.5 * ref_impedance * z / denominator
    }

    /// Impedance of a series DUT measured as transmission
    pub fn series_impedance(&self, ref_impedance: f64) -> Complex64 {
        let z = self.z();
        if z == Complex64::new(0.0, 0.0) {
            return Complex64::new(f64::INFINITY, 0.0);
        }
        2.0 * ref_impedance * (Complex64::new(1.0, 0.0) - z) / z
    }

    /// |X/R| of the reflected impedance, -1 when purely reactive
    pub fn q_factor(&self, ref_impedance: f64) -> f64 {
        let imp = self.impedance(ref_impedance);
        if imp.re == 0.0 {
            -1.0
        } else {
            (imp.im / imp.re).abs()
        }
    }

    pub fn capacitive_equivalent(&self, ref_impedance: f64) -> f64 {
        impedance_to_capacitance(self.impedance(ref_impedance), self.freq as f64)
    }

    pub fn inductive_equivalent(&self, ref_impedance: f64) -> f64 {
        impedance_to_inductance(self.impedance(ref_impedance), self.freq as f64)
    }

    /// Angular frequency in rad/s
    pub fn omega(&self) -> f64 {
        2.0 * PI * self.freq as f64
    }
}
