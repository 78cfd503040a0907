//! Onset matcher - nearest onset lookup for a monotonically advancing grid
//!
//! Query times normally never decrease between calls, so the hint index only
//! moves forward, giving amortized O(1) per query instead of a binary search
//! per beat. `OnsetMatcher` rewinds the hint on the rare backwards query. A narrow neighbourhood scan around the hint
//! (`hint-1 ..= hint+2`) absorbs small local index drift.

/// Find the onset nearest to `t` within `window_s`, scanning forward from `hint`.
///
/// # Arguments
/// * `onsets` - Ascending onset timestamps (seconds)
/// * `hint` - Index returned by the previous call (0 for the first call)
/// * `t` - Query time; must be >= every earlier query made with this hint
/// * `window_s` - Maximum accepted distance (seconds)
///
/// # Returns
/// `(matched onset time, hint for the next call)`. On a match the hint is the
/// matched index; otherwise it is the advanced scan position. The returned hint
/// is never lower than the one passed in.
pub fn find_nearest_onset(
    onsets: &[f64],
    hint: usize,
    t: f64,
    window_s: f64,
) -> (Option<f64>, usize) {
    let n = onsets.len();
    if n == 0 {
        return (None, hint);
    }

    let mut i = hint.min(n - 1);
    while i + 1 < n && onsets[i] < t - window_s {
        i += 1;
    }

    let mut best: Option<(f64, usize)> = None;
    for j in i.saturating_sub(1)..=(i + 2).min(n - 1) {
        let dt = (onsets[j] - t).abs();
        if dt <= window_s && best.map_or(true, |(best_dt, _)| dt < best_dt) {
            best = Some((dt, j));
        }
    }

    match best {
        Some((_, j)) => (Some(onsets[j]), j.max(hint)),
        None => (None, i),
    }
}

/// Stateful wrapper that owns the hint for one pass over the grid
#[derive(Debug, Clone)]
pub struct OnsetMatcher<'a> {
    onsets: &'a [f64],
    window_s: f64,
    hint: usize,
    last_query: f64,
}

impl<'a> OnsetMatcher<'a> {
    pub fn new(onsets: &'a [f64], window_s: f64) -> Self {
        Self {
            onsets,
            window_s,
            hint: 0,
            last_query: f64::NEG_INFINITY,
        }
    }

    /// Nearest onset to `t` within the match window, if any
    ///
    /// Queries are expected to be non-decreasing. A window wider than the
    /// beat interval can re-anchor the grid onto an onset far enough back
    /// that the next query moves backwards; the hint is then rewound with a
    /// binary search so the lookup stays exact.
    pub fn find(&mut self, t: f64) -> Option<f64> {
        if t < self.last_query {
            let rewound = self
                .onsets
                .partition_point(|&o| o < t - self.window_s)
                .saturating_sub(1);
            log::debug!(
                "[OnsetMatcher] Query {:.4}s precedes {:.4}s; rewinding hint {} -> {}",
                t,
                self.last_query,
                self.hint,
                rewound
            );
            self.hint = rewound.min(self.hint);
        }
        self.last_query = t;

        let (matched, hint) = find_nearest_onset(self.onsets, self.hint, t, self.window_s);
        self.hint = hint;
        matched
    }

    /// Current scan position
    pub fn hint(&self) -> usize {
        self.hint
    }
}
