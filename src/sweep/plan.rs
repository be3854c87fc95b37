use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{SweepError, SweepResult};

/// How the worker repeats a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SweepMode {
    #[default]
    Single,
    Continuous,
    Average,
}

/// Averaging settings: passes per segment and outliers dropped per point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Averages {
    pub count: usize,
    pub truncate: usize,
}

impl Default for Averages {
    fn default() -> Self {
        Self {
            count: 3,
            truncate: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SweepProperties {
    pub name: String,
    pub mode: SweepMode,
    pub averages: Averages,
    pub logarithmic: bool,
}

/// Frequency plan of one sweep, split into instrument-sized segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepPlan {
    /// Start frequency in Hz
    pub start: u64,
    /// End frequency in Hz
    pub end: u64,
    /// Points per segment
    pub points: usize,
    pub segments: usize,
    pub properties: SweepProperties,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            start: 3_600_000,
            end: 30_000_000,
            points: 101,
            segments: 1,
            properties: SweepProperties::default(),
        }
    }
}

impl SweepPlan {
    pub fn new(start: u64, end: u64, points: usize, segments: usize) -> Self {
        Self {
            start,
            end,
            points,
            segments,
            properties: SweepProperties::default(),
        }
    }

    /// Split `total_points` into segments of `max_points` each.
    ///
    /// Every segment has the same length, so the total is rounded up to a
    /// multiple of `max_points` (250 points at 101 per segment gives 303).
    pub fn for_instrument(start: u64, end: u64, total_points: usize, max_points: usize) -> Self {
        let max_points = max_points.max(1);
        let segments = total_points.div_ceil(max_points).max(1);
        Self::new(start, end, max_points, segments)
    }

    pub fn with_mode(mut self, mode: SweepMode) -> Self {
        self.properties.mode = mode;
        self
    }

    pub fn with_averages(mut self, count: usize, truncate: usize) -> Self {
        self.properties.averages = Averages { count, truncate };
        self
    }

    pub fn with_logarithmic(mut self, logarithmic: bool) -> Self {
        self.properties.logarithmic = logarithmic;
        self
    }

    pub fn span(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn total_points(&self) -> usize {
        self.points * self.segments
    }

    /// Frequency step between adjacent points of a linear sweep
    pub fn stepsize(&self) -> u64 {
        let intervals = self.total_points().saturating_sub(1).max(1);
        (self.span() as f64 / intervals as f64).round() as u64
    }

    pub fn check(&self) -> SweepResult<()> {
        if self.segments == 0
            || self.points == 0
            || self.end == 0
            || self.end <= self.start
            || self.total_points() < 2
            || self.stepsize() < 1
        {
            return Err(SweepError::InvalidPlan(format!(
                "start={} end={} points={} segments={}",
                self.start, self.end, self.points, self.segments
            )));
        }
        Ok(())
    }

    fn exp_factor(&self, index: usize) -> f64 {
        let n = self.segments as f64 + 1.0;
        1.0 - (n - index as f64).ln() / n.ln()
    }

    /// Start and stop frequency of segment `index`
    pub fn index_range(&self, index: usize) -> (u64, u64) {
        let (start, stop) = if self.properties.logarithmic {
            let edge = |i: usize| (self.start as f64 + self.span() as f64 * self.exp_factor(i)).round() as u64;
            let lower = edge(index);
            // later segments begin one step past the previous segment's last point
            let start = if index == 0 {
                lower
            } else {
                let previous = lower - edge(index - 1);
                lower + (previous / self.points.saturating_sub(1).max(1) as u64).max(1)
            };
            (start, edge(index + 1))
        } else {
            let step = self.stepsize();
            let start = self.start + (index * self.points) as u64 * step;
            let stop = start + (self.points.saturating_sub(1)) as u64 * step;
            (start, stop)
        };
        debug!("index_range({}) -> ({}, {})", index, start, stop);
        (start, stop)
    }

    /// Offset of segment `index` in the full-sweep buffers
    pub fn segment_offset(&self, index: usize) -> usize {
        index * self.points
    }

    /// Nominal frequencies used to pre-fill the sweep buffers
    pub fn frequencies(&self) -> Vec<u64> {
        let mut frequencies = Vec::with_capacity(self.total_points());
        for i in 0..self.segments {
            let (start, stop) = self.index_range(i);
            let step = stop.saturating_sub(start) as f64 / self.points as f64;
            for k in 0..self.points {
                frequencies.push((start as f64 + k as f64 * step).round() as u64);
            }
        }
        frequencies
    }

    /// Passes read per segment; only Average mode averages
    pub fn passes_per_segment(&self) -> usize {
        match self.properties.mode {
            SweepMode::Average => self.properties.averages.count.max(1),
            _ => 1,
        }
    }

    /// Outliers dropped per point
    pub fn truncate(&self) -> usize {
        self.properties.averages.truncate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_segments_are_contiguous() {
        let plan = SweepPlan::new(1_000_000, 1_000_000 + 201 * 1_000, 101, 2);
        plan.check().unwrap();
        let (s0, e0) = plan.index_range(0);
        let (s1, _) = plan.index_range(1);
        assert_eq!(s0, 1_000_000);
        assert_eq!(e0, s0 + 100 * plan.stepsize());
        assert_eq!(s1, e0 + plan.stepsize());
    }

    #[test]
    fn test_log_segments_do_not_share_edges() {
        let plan = SweepPlan::new(1_000_000, 101_000_000, 101, 3).with_logarithmic(true);
        let (_, e0) = plan.index_range(0);
        let (s1, e1) = plan.index_range(1);
        let (s2, e2) = plan.index_range(2);
        assert!(e0 < s1 && e1 < s2);
        assert!(s1 < e1 && s2 < e2);
        assert_eq!(e2, 101_000_000);
    }

    #[test]
    fn test_for_instrument_rounds_up() {
        let plan = SweepPlan::for_instrument(1_000_000, 30_000_000, 250, 101);
        assert_eq!(plan.segments, 3);
        assert_eq!(plan.total_points(), 303);
    }

    #[test]
    fn test_illegal_plans() {
        assert!(SweepPlan::new(10, 5, 101, 1).check().is_err());
        assert!(SweepPlan::new(0, 1_000, 0, 1).check().is_err());
        assert!(SweepPlan::new(0, 1_000, 101, 0).check().is_err());
        assert!(SweepPlan::new(0, 10, 101, 1).check().is_err());
        assert!(matches!(
            SweepPlan::new(0, 0, 101, 1).check(),
            Err(SweepError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_averaging_only_in_average_mode() {
        let plan = SweepPlan::default().with_averages(5, 1);
        assert_eq!(plan.passes_per_segment(), 1);
        assert_eq!(plan.with_mode(SweepMode::Average).passes_per_segment(), 5);
    }
}
