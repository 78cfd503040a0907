//! Phase selector - beat-zero alignment of the seed anchor
//!
//! The seed anchor can be right about the tempo but wrong about which
//! sub-beat position is "the beat" (everything lines up on the off-beat, or a
//! sixteenth early). The selector tests `divisions` equally spaced shifts of
//! one beat, `t0 + k/D * interval`, and scores each by simulating the grid
//! over the first `search_seconds` of onsets.
//!
//! Score: matched onset count (primary), median absolute error (tie-break).
//! Comparisons are strict, so on an exact tie the earliest tested shift wins.

use super::matcher::OnsetMatcher;
use super::OnsetSet;
use crate::stats::median;

/// Shortest horizon used for phase scoring
pub const MIN_SEARCH_SECONDS: f64 = 3.0;

/// Onsets this far outside the horizon are still considered
const RANGE_MARGIN_S: f64 = 0.5;

/// Intervals at or below this disable phase selection
const MIN_INTERVAL_S: f64 = 1e-6;

/// Outcome of phase selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSelection {
    /// Refined anchor (equal to the seed when nothing was selected)
    pub anchor: f64,
    /// Winning shift index, or `None` if the seed passed through unchanged
    pub division: Option<usize>,
    /// Matches scored by the winning shift
    pub matches: usize,
    /// Median absolute error of the winning shift (seconds)
    pub median_abs_error: f64,
}

impl PhaseSelection {
    fn passthrough(anchor: f64) -> Self {
        Self {
            anchor,
            division: None,
            matches: 0,
            median_abs_error: f64::INFINITY,
        }
    }
}

/// Score a single candidate anchor: (matches, median absolute error)
fn score_candidate(anchor: f64, interval: f64, onsets: &[f64], window_s: f64, horizon_s: f64) -> (usize, f64) {
    let mut matcher = OnsetMatcher::new(onsets, window_s);
    let mut abs_errors = Vec::new();
    let end = anchor + horizon_s;

    let mut beat = 0u64;
    let mut t = anchor;
    while t <= end {
        if let Some(matched) = matcher.find(t) {
            abs_errors.push((matched - t).abs());
        }
        beat += 1;
        t = anchor + beat as f64 * interval;
    }

    let median_abs_error = if abs_errors.is_empty() {
        f64::INFINITY
    } else {
        median(&abs_errors)
    };
    (abs_errors.len(), median_abs_error)
}

/// Pick the best of `divisions` sub-beat shifts of `seed_anchor`
///
/// # Arguments
/// * `seed_anchor` - Anchor from the seeder (seconds)
/// * `interval` - Beat interval (seconds)
/// * `onsets` - Detected onsets
/// * `window_s` - Match window (seconds)
/// * `search_seconds` - Scoring horizon; clamped to at least 3 s
/// * `divisions` - Number of shifts to test; clamped to at least 1
///
/// # Returns
/// The winning shift, or the seed unchanged if there are no onsets near the
/// horizon or no shift matched anything.
pub fn choose_best_phase(
    seed_anchor: f64,
    interval: f64,
    onsets: &OnsetSet,
    window_s: f64,
    search_seconds: f64,
    divisions: usize,
) -> PhaseSelection {
    if onsets.is_empty() || interval <= MIN_INTERVAL_S {
        return PhaseSelection::passthrough(seed_anchor);
    }

    let divisions = divisions.max(1);
    let horizon_s = search_seconds.max(MIN_SEARCH_SECONDS);

    let nearby = onsets.range(
        (seed_anchor - RANGE_MARGIN_S).max(0.0),
        seed_anchor + horizon_s + RANGE_MARGIN_S,
    );
    if nearby.is_empty() {
        log::debug!(
            "[PhaseSelector] No onsets within {:.1}s of anchor {:.3}s; keeping seed",
            horizon_s,
            seed_anchor
        );
        return PhaseSelection::passthrough(seed_anchor);
    }

    let mut best = PhaseSelection::passthrough(seed_anchor);
    for k in 0..divisions {
        let candidate = seed_anchor + (k as f64 / divisions as f64) * interval;
        let (matches, median_abs_error) =
            score_candidate(candidate, interval, nearby, window_s, horizon_s);
        log::trace!(
            "[PhaseSelector] shift {}/{}: anchor={:.4}s matches={} median|err|={:.2}ms",
            k,
            divisions,
            candidate,
            matches,
            median_abs_error * 1000.0
        );

        if matches == 0 {
            continue;
        }
        let improves = best.division.is_none()
            || matches > best.matches
            || (matches == best.matches && median_abs_error < best.median_abs_error);
        if improves {
            best = PhaseSelection {
                anchor: candidate,
                division: Some(k),
                matches,
                median_abs_error,
            };
        }
    }

    best
}
