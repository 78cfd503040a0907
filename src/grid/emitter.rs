//! Timing point emitter with anti-spam gating
//!
//! Holds the output list. A new point is only accepted if it lands at least
//! `min_gap_ms` after the previous one (and strictly after it), and never
//! beyond `max_points` in total. The seed point is always the first entry.

use super::TimingPoint;

#[derive(Debug, Clone)]
pub struct TimingPointEmitter {
    points: Vec<TimingPoint>,
    min_gap_ms: f64,
    max_points: usize,
}

impl TimingPointEmitter {
    /// Start the output with the seed point
    pub fn new(seed: TimingPoint, min_gap_ms: f64, max_points: usize) -> Self {
        Self {
            points: vec![seed],
            min_gap_ms,
            max_points,
        }
    }

    /// Time of the most recently emitted point
    pub fn last_time(&self) -> f64 {
        self.points.last().map_or(f64::NEG_INFINITY, |p| p.time)
    }

    /// Whether the hard cap has been reached
    pub fn is_full(&self) -> bool {
        self.points.len() >= self.max_points
    }

    /// Whether a point at `time` would pass the gap check
    pub fn accepts(&self, time: f64) -> bool {
        let last = self.last_time();
        time > last && (time - last) * 1000.0 >= self.min_gap_ms
    }

    /// Append a point; returns `false` (and emits nothing) if it fails gating
    pub fn emit(&mut self, time: f64, bpm: f64) -> bool {
        if self.is_full() || !self.accepts(time) {
            return false;
        }
        self.points.push(TimingPoint { time, bpm });
        true
    }

    pub fn points(&self) -> &[TimingPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<TimingPoint> {
        self.points
    }
}
