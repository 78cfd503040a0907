//! Grid engine - beat-by-beat reconciliation loop
//!
//! Owns every piece of mutable state (grid, rolling window, persistence
//! counters, output) for the duration of one pass. Each beat:
//!
//! 1. query the onset matcher at the current grid time
//! 2. push the signed error into the rolling window if an onset matched
//! 3. run the classifier (once enough beats have matched)
//! 4. on a sustained drift/jump, try to emit a timing point, which re-anchors
//!    the grid and clears the window + counters
//! 5. advance to the next beat
//!
//! The loop stops past the audio duration or once `max_points` is reached.

use serde::Serialize;

use super::classifier::{Action, DriftJumpClassifier, Evaluation};
use super::emitter::TimingPointEmitter;
use super::matcher::OnsetMatcher;
use super::phase::{choose_best_phase, PhaseSelection};
use super::window::RollingWindow;
use super::{GridState, OnsetSet, TimingPoint, FALLBACK_BPM};
use crate::config::{GapRejectPolicy, TimingConfig};
use crate::error::TimingError;

/// Proposed intervals at or below this are rejected instead of divided by
const MIN_INTERVAL_S: f64 = 1e-4;

/// Counters describing one engine pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Grid beats visited by the loop
    pub beats_visited: u64,
    /// Beats that found an onset inside the match window
    pub beats_matched: u64,
    /// Classifier evaluations (beats with a full enough window)
    pub evaluations: u64,
    /// Timing points emitted for a tempo change
    pub drift_points: u64,
    /// Timing points emitted for a phase reset
    pub jump_points: u64,
    /// Actions that were due but landed too close to the previous point
    pub gap_rejections: u64,
}

/// Output of [`generate_timing_points`]
#[derive(Debug, Clone, PartialEq)]
pub struct TimingResult {
    /// Ordered timing points; the first one is the refined seed
    pub points: Vec<TimingPoint>,
    /// Seed tempo actually used (after the fallback for degenerate seeds)
    pub seed_bpm: f64,
    /// Tempo of the grid when the loop stopped
    pub final_bpm: f64,
    /// Phase selection applied to the seed anchor
    pub phase: PhaseSelection,
    pub stats: EngineStats,
}

/// Replace a non-finite or non-positive seed tempo with [`FALLBACK_BPM`]
pub fn effective_seed_bpm(seed_bpm: f64) -> f64 {
    if seed_bpm.is_finite() && seed_bpm > 1e-6 {
        seed_bpm
    } else {
        log::warn!(
            "[GridEngine] Seed BPM {} is unusable; falling back to {}",
            seed_bpm,
            FALLBACK_BPM
        );
        FALLBACK_BPM
    }
}

/// Generate a minimal list of timing points for an onset set
///
/// # Arguments
/// * `onsets` - Detected onsets (seconds, ascending)
/// * `seed_bpm` - Initial tempo estimate; degenerate values fall back to 120
/// * `seed_anchor` - Initial beat-zero time (seconds); may be negative
/// * `duration` - Audio duration (seconds); the loop stops past it
/// * `config` - Reconciliation thresholds
///
/// # Errors
/// `TimingError` if the configuration is invalid, the duration is negative
/// or not finite, or the anchor is not finite.
pub fn generate_timing_points(
    onsets: &OnsetSet,
    seed_bpm: f64,
    seed_anchor: f64,
    duration: f64,
    config: &TimingConfig,
) -> Result<TimingResult, TimingError> {
    config.validate()?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(TimingError::InvalidDuration { duration });
    }
    if !seed_anchor.is_finite() {
        return Err(TimingError::InvalidAnchor {
            anchor: seed_anchor,
        });
    }

    let seed_bpm = effective_seed_bpm(seed_bpm);
    if 2.0 * config.match_window_s() >= 60.0 / seed_bpm {
        log::warn!(
            "[GridEngine] Match window {:.0}ms spans half a beat at {:.2} BPM; neighbouring beats can claim the same onset",
            config.match_window_ms,
            seed_bpm
        );
    }
    let phase = choose_best_phase(
        seed_anchor,
        60.0 / seed_bpm,
        onsets,
        config.match_window_s(),
        config.phase_search_seconds,
        config.phase_divisions,
    );
    tracing::debug!(
        "[GridEngine] Seed {:.2} BPM, anchor {:.4}s -> phase-refined anchor {:.4}s (division {:?}, {} matches)",
        seed_bpm,
        seed_anchor,
        phase.anchor,
        phase.division,
        phase.matches
    );

    let mut engine = GridEngine::new(onsets, seed_bpm, phase.anchor, config);
    engine.run(duration);

    let final_bpm = engine.grid.bpm();
    let stats = engine.stats;
    let points = engine.emitter.into_points();
    tracing::debug!(
        "[GridEngine] {} timing points ({} drift, {} jump); {}/{} beats matched, {} evaluations, {} gap rejections",
        points.len(),
        stats.drift_points,
        stats.jump_points,
        stats.beats_matched,
        stats.beats_visited,
        stats.evaluations,
        stats.gap_rejections
    );

    Ok(TimingResult {
        points,
        seed_bpm,
        final_bpm,
        phase,
        stats,
    })
}

struct GridEngine<'a> {
    grid: GridState,
    matcher: OnsetMatcher<'a>,
    window: RollingWindow,
    classifier: DriftJumpClassifier,
    emitter: TimingPointEmitter,
    bpm_min_change: f64,
    gap_reject_policy: GapRejectPolicy,
    stats: EngineStats,
}

impl<'a> GridEngine<'a> {
    fn new(onsets: &'a OnsetSet, bpm: f64, anchor: f64, config: &TimingConfig) -> Self {
        Self {
            grid: GridState::new(bpm, anchor),
            matcher: OnsetMatcher::new(onsets.as_slice(), config.match_window_s()),
            window: RollingWindow::with_capacity(config.window_capacity()),
            classifier: DriftJumpClassifier::new(config),
            emitter: TimingPointEmitter::new(
                TimingPoint { time: anchor, bpm },
                config.min_gap_ms,
                config.max_points,
            ),
            bpm_min_change: config.bpm_min_change,
            gap_reject_policy: config.gap_reject_policy,
            stats: EngineStats::default(),
        }
    }

    fn run(&mut self, duration: f64) {
        self.grid.skip_negative_beats();
        while self.grid.current_time() <= duration && !self.emitter.is_full() {
            self.step();
            self.grid.advance();
        }
    }

    fn step(&mut self) {
        let t = self.grid.current_time();
        self.stats.beats_visited += 1;

        let matched = self.matcher.find(t);
        if let Some(onset) = matched {
            self.window.push(self.grid.beat_index(), onset - t);
            self.stats.beats_matched += 1;
        }

        let Some((evaluation, action)) = self.classifier.evaluate(&self.window) else {
            return;
        };
        self.stats.evaluations += 1;

        match action {
            Action::Hold => {}
            Action::Drift => self.try_drift(t, matched, &evaluation),
            Action::Jump => self.try_jump(t, matched, &evaluation),
        }
    }

    /// Anchor for a new point: this beat's onset, else the grid shifted by the median error
    fn candidate_anchor(t: f64, matched: Option<f64>, evaluation: &Evaluation) -> f64 {
        matched.unwrap_or(t + evaluation.median_error_s)
    }

    fn try_drift(&mut self, t: f64, matched: Option<f64>, evaluation: &Evaluation) {
        let new_interval = self.grid.interval() + evaluation.slope_s_per_beat;
        if new_interval <= MIN_INTERVAL_S {
            tracing::debug!(
                "[GridEngine] Drift at {:.3}s proposes a degenerate interval ({:.6}s); ignored",
                t,
                new_interval
            );
            return;
        }
        let new_bpm = 60.0 / new_interval;
        if !new_bpm.is_finite() || (new_bpm - self.grid.bpm()).abs() < self.bpm_min_change {
            return;
        }

        let anchor = Self::candidate_anchor(t, matched, evaluation);
        if !self.emitter.emit(anchor, new_bpm) {
            self.reject_gap(anchor);
            return;
        }

        tracing::info!(
            "[GridEngine] Tempo change at {:.3}s: {:.2} -> {:.2} BPM (slope {:.3}ms/beat)",
            anchor,
            self.grid.bpm(),
            new_bpm,
            evaluation.slope_ms_per_beat()
        );
        self.grid.retempo(new_bpm, anchor);
        self.stats.drift_points += 1;
        self.clear_evidence();
    }

    fn try_jump(&mut self, t: f64, matched: Option<f64>, evaluation: &Evaluation) {
        let anchor = Self::candidate_anchor(t, matched, evaluation);
        let bpm = self.grid.bpm();
        if !self.emitter.emit(anchor, bpm) {
            self.reject_gap(anchor);
            return;
        }

        tracing::info!(
            "[GridEngine] Offset reset at {:.3}s (median error {:.2}ms, {:.2} BPM kept)",
            anchor,
            evaluation.median_error_ms(),
            bpm
        );
        self.grid.re_anchor(anchor);
        self.stats.jump_points += 1;
        self.clear_evidence();
    }

    fn reject_gap(&mut self, anchor: f64) {
        self.stats.gap_rejections += 1;
        tracing::trace!(
            "[GridEngine] Candidate anchor {:.3}s within {:.3}s of previous point; not emitted",
            anchor,
            anchor - self.emitter.last_time()
        );
        if self.gap_reject_policy == GapRejectPolicy::Reset {
            self.classifier.reset();
        }
    }

    fn clear_evidence(&mut self) {
        self.window.clear();
        self.classifier.reset();
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
