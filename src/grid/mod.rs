// Grid reconciliation core
//
// Turns an onset list plus a seeded (bpm, anchor) pair into a minimal list of
// timing points. The grid only moves when the onsets say it has drifted
// (tempo change) or jumped (phase reset), and only once that condition has
// persisted for several evaluations.
//
// Pipeline: PhaseSelector → simulation loop { OnsetMatcher → RollingWindow →
// slope/median → DriftJumpClassifier → TimingPointEmitter }

use serde::{Deserialize, Serialize};

pub mod classifier;
pub mod emitter;
pub mod engine;
pub mod matcher;
pub mod phase;
pub mod slope;
pub mod window;

pub use classifier::{Action, DriftJumpClassifier, Evaluation, PersistenceCounters};
pub use emitter::TimingPointEmitter;
pub use engine::{effective_seed_bpm, generate_timing_points, EngineStats, TimingResult};
pub use matcher::{find_nearest_onset, OnsetMatcher};
pub use phase::{choose_best_phase, PhaseSelection};
pub use slope::robust_slope;
pub use window::RollingWindow;

/// BPM used when the seed tempo is not finite or not positive
pub const FALLBACK_BPM: f64 = 120.0;

/// Immutable, ascending onset timestamps in seconds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnsetSet {
    times: Vec<f64>,
}

impl OnsetSet {
    /// Build an onset set, sorting the input and dropping non-finite values
    pub fn new(mut times: Vec<f64>) -> Self {
        let before = times.len();
        times.retain(|t| t.is_finite());
        if times.len() != before {
            log::warn!(
                "[OnsetSet] Dropped {} non-finite onset timestamps",
                before - times.len()
            );
        }
        times.sort_by(f64::total_cmp);
        Self { times }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Onsets inside the closed interval `[start, end]`
    pub fn range(&self, start: f64, end: f64) -> &[f64] {
        let lo = self.times.partition_point(|&t| t < start);
        let hi = self.times.partition_point(|&t| t <= end);
        if lo >= hi {
            &[]
        } else {
            &self.times[lo..hi]
        }
    }
}

impl From<Vec<f64>> for OnsetSet {
    fn from(times: Vec<f64>) -> Self {
        Self::new(times)
    }
}

/// An emitted (time, bpm) anchor where the authoritative beat grid changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    /// Seconds from the start of the audio
    pub time: f64,
    /// Tempo from this point on
    pub bpm: f64,
}

/// Current beat grid: beat `k` falls at `t0 + k * interval`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridState {
    bpm: f64,
    interval: f64,
    t0: f64,
    beat_index: u64,
}

impl GridState {
    /// Grid anchored at `anchor` (beat 0) with the given tempo
    pub fn new(bpm: f64, anchor: f64) -> Self {
        Self {
            bpm,
            interval: 60.0 / bpm,
            t0: anchor,
            beat_index: 0,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Seconds per beat
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Time of beat 0 for the current tempo/phase
    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn beat_index(&self) -> u64 {
        self.beat_index
    }

    /// Grid time of an arbitrary beat index
    pub fn time_at(&self, beat_index: u64) -> f64 {
        self.t0 + beat_index as f64 * self.interval
    }

    /// Grid time of the current beat (the authoritative query time)
    pub fn current_time(&self) -> f64 {
        self.time_at(self.beat_index)
    }

    pub fn advance(&mut self) {
        self.beat_index += 1;
    }

    /// Move to the first beat whose grid time is >= 0
    pub fn skip_negative_beats(&mut self) {
        if self.current_time() >= 0.0 {
            return;
        }
        let beats_to_zero = (-self.t0 / self.interval).ceil();
        if beats_to_zero.is_finite() && beats_to_zero > self.beat_index as f64 {
            self.beat_index = beats_to_zero as u64;
        }
        // ceil() can land one beat short after rounding
        while self.current_time() < 0.0 {
            self.beat_index += 1;
        }
    }

    /// Shift the phase so the current beat falls on `anchor`
    pub fn re_anchor(&mut self, anchor: f64) {
        self.t0 = anchor - self.beat_index as f64 * self.interval;
    }

    /// Change tempo and phase so the current beat falls on `anchor`
    pub fn retempo(&mut self, bpm: f64, anchor: f64) {
        self.bpm = bpm;
        self.interval = 60.0 / bpm;
        self.re_anchor(anchor);
    }
}
