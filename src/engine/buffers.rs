use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::Datapoint;
use crate::sweep::SweepPlan;

/// Raw and corrected S11/S21 for one whole sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepData {
    pub s11: Vec<Datapoint>,
    pub s21: Vec<Datapoint>,
    pub raw_s11: Vec<Datapoint>,
    pub raw_s21: Vec<Datapoint>,
}

/// Raw and corrected points of one acquired segment
#[derive(Debug, Clone, Default)]
pub struct SegmentData {
    pub s11: Vec<Datapoint>,
    pub s21: Vec<Datapoint>,
    pub raw_s11: Vec<Datapoint>,
    pub raw_s21: Vec<Datapoint>,
}

impl SegmentData {
    pub fn len(&self) -> usize {
        self.raw_s11.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_s11.is_empty()
    }
}

impl SweepData {
    /// Zero-valued points at the plan's nominal frequencies
    pub fn placeholder(plan: &SweepPlan) -> Self {
        let points: Vec<Datapoint> = plan.frequencies().into_iter().map(Datapoint::placeholder).collect();
        Self {
            s11: points.clone(),
            s21: points.clone(),
            raw_s11: points.clone(),
            raw_s21: points,
        }
    }

    pub fn len(&self) -> usize {
        self.s11.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s11.is_empty()
    }

    /// Overwrite all four buffers at `offset` with one segment
    pub fn write_segment(&mut self, offset: usize, segment: &SegmentData) {
        let end = offset + segment.len();
        if end > self.len() {
            warn!(
                "Segment at {} with {} points overruns sweep of {} points",
                offset,
                segment.len(),
                self.len()
            );
        }
        let end = end.min(self.len());
        let Some(n) = end.checked_sub(offset) else {
            return;
        };

        self.s11[offset..end].copy_from_slice(&segment.s11[..n]);
        self.s21[offset..end].copy_from_slice(&segment.s21[..n]);
        self.raw_s11[offset..end].copy_from_slice(&segment.raw_s11[..n]);
        self.raw_s21[offset..end].copy_from_slice(&segment.raw_s21[..n]);
    }

    /// Corrected (S11, S21) arrays
    pub fn corrected(&self) -> (Vec<Datapoint>, Vec<Datapoint>) {
        (self.s11.clone(), self.s21.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_matches_plan() {
        let plan = SweepPlan::new(1_000_000, 2_000_000, 11, 2);
        let data = SweepData::placeholder(&plan);
        assert_eq!(data.len(), 22);
        assert!(data.raw_s21.iter().all(|dp| dp.re == 0.0 && dp.im == 0.0));
        assert!(data.s11.windows(2).all(|w| w[0].freq < w[1].freq));
    }

    #[test]
    fn test_write_segment_at_offset() {
        let plan = SweepPlan::new(1_000_000, 2_000_000, 3, 2);
        let mut data = SweepData::placeholder(&plan);
        let points = vec![Datapoint::new(7, 1.0, 1.0); 3];
        let segment = SegmentData {
            s11: points.clone(),
            s21: points.clone(),
            raw_s11: points.clone(),
            raw_s21: points,
        };

        data.write_segment(3, &segment);
        assert_eq!(data.s11[2].re, 0.0);
        assert_eq!(data.s11[3].freq, 7);
        assert_eq!(data.raw_s21[5].im, 1.0);

        // overrun is clipped
        data.write_segment(5, &segment);
        assert_eq!(data.len(), 6);
    }
}
