//! Drift/jump classifier with persistence gating
//!
//! Once the rolling window holds at least `min_matches` matched beats, every
//! beat is evaluated:
//!
//! - drift: |slope| >= drift threshold (ms per beat)
//! - jump:  |median error| >= offset threshold (ms) AND |slope| < 0.6 × drift
//!   threshold, so errors already explained by drift are not read as a jump
//!
//! Each condition has its own streak counter: +1 when it holds, back to 0 when
//! it does not. An action is only proposed once a streak reaches `persist`.
//! Drift is checked first; while the drift streak is at or above `persist`
//! the jump branch is not considered for that beat.

use super::slope::robust_slope;
use super::window::RollingWindow;
use crate::config::TimingConfig;
use crate::stats::median;

/// Fraction of the drift threshold below which a median offset counts as a jump
pub const JUMP_SLOPE_FRACTION: f64 = 0.6;

/// Consecutive-evaluation streaks for both conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceCounters {
    pub drift: usize,
    pub jump: usize,
}

impl PersistenceCounters {
    fn update(&mut self, is_drift: bool, is_jump: bool) {
        self.drift = if is_drift { self.drift + 1 } else { 0 };
        self.jump = if is_jump { self.jump + 1 } else { 0 };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Window statistics computed on one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Median of window errors (seconds)
    pub median_error_s: f64,
    /// Robust error slope (seconds per beat)
    pub slope_s_per_beat: f64,
    pub is_drift: bool,
    pub is_jump: bool,
}

impl Evaluation {
    pub fn median_error_ms(&self) -> f64 {
        self.median_error_s * 1000.0
    }

    pub fn slope_ms_per_beat(&self) -> f64 {
        self.slope_s_per_beat * 1000.0
    }
}

/// What the engine should attempt on this beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing has persisted long enough
    Hold,
    /// Tempo change: extrapolate the interval by the measured slope
    Drift,
    /// Phase reset: move the anchor, keep the tempo
    Jump,
}

#[derive(Debug, Clone)]
pub struct DriftJumpClassifier {
    min_matches: usize,
    persist: usize,
    offset_threshold_ms: f64,
    drift_slope_ms_per_beat: f64,
    counters: PersistenceCounters,
}

impl DriftJumpClassifier {
    pub fn new(config: &TimingConfig) -> Self {
        Self {
            min_matches: config.min_matches,
            persist: config.persist,
            offset_threshold_ms: config.offset_threshold_ms,
            drift_slope_ms_per_beat: config.drift_slope_ms_per_beat,
            counters: PersistenceCounters::default(),
        }
    }

    pub fn counters(&self) -> PersistenceCounters {
        self.counters
    }

    /// Clear both streaks (after an emission, or on a rejected action under
    /// the `reset` gap policy)
    pub fn reset(&mut self) {
        self.counters.reset();
    }

    /// Evaluate the window for the current beat
    ///
    /// Returns `None` while the window holds fewer than `min_matches` entries;
    /// the counters are left untouched in that case.
    pub fn evaluate(&mut self, window: &RollingWindow) -> Option<(Evaluation, Action)> {
        if window.len() < self.min_matches {
            return None;
        }

        let errors = window.errors();
        let median_error_s = median(&errors);
        let slope_s_per_beat = robust_slope(&window.beat_indices(), &errors);

        let median_ms = median_error_s * 1000.0;
        let slope_ms = slope_s_per_beat * 1000.0;

        let is_drift = slope_ms.abs() >= self.drift_slope_ms_per_beat;
        let is_jump = median_ms.abs() >= self.offset_threshold_ms
            && slope_ms.abs() < self.drift_slope_ms_per_beat * JUMP_SLOPE_FRACTION;

        self.counters.update(is_drift, is_jump);

        let action = if self.counters.drift >= self.persist {
            Action::Drift
        } else if self.counters.jump >= self.persist {
            Action::Jump
        } else {
            Action::Hold
        };

        tracing::trace!(
            "[Classifier] median={:.2}ms slope={:.3}ms/beat drift_streak={} jump_streak={} -> {:?}",
            median_ms,
            slope_ms,
            self.counters.drift,
            self.counters.jump,
            action
        );

        Some((
            Evaluation {
                median_error_s,
                slope_s_per_beat,
                is_drift,
                is_jump,
            },
            action,
        ))
    }
}
