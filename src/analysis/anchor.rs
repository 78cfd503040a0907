// Anchor seeding - one-shot dynamic-programming beat tracker
//
// Given the onset envelope and a fixed tempo, finds the beat sequence that
// maximises onset strength at the beats minus a penalty for inter-beat
// intervals that stray from the period:
//
//   cumscore[i] = local[i] + max_p (cumscore[p] - tightness · ln((i - p) / period)²)
//
// with p in [i - 2·period, i - period/2]. Only the first beat of the best
// sequence is used, as the initial anchor of the grid.

use super::onset::OnsetEnvelope;

/// Leading frames weaker than this fraction of the peak local score cannot
/// start a beat sequence
const FIRST_BEAT_FRACTION: f64 = 0.01;

pub struct BeatTracker {
    tightness: f64,
}

impl BeatTracker {
    pub fn new(tightness: f64) -> Self {
        Self {
            tightness: tightness.max(0.0),
        }
    }

    /// Beat frames (ascending) for the envelope at a fixed tempo
    pub fn track(&self, envelope: &OnsetEnvelope, bpm: f64) -> Vec<usize> {
        let n = envelope.len();
        if n == 0 || !bpm.is_finite() || bpm <= 0.0 {
            return Vec::new();
        }
        let period = (60.0 * envelope.frame_rate() / bpm).round();
        if period < 1.0 {
            return Vec::new();
        }
        let period_frames = period as usize;

        let Some(local) = local_score(&envelope.values, period_frames) else {
            return Vec::new();
        };

        let max_back = 2 * period_frames;
        let min_back = ((period / 2.0).round() as usize).max(1);
        let transition: Vec<f64> = (0..=max_back)
            .map(|back| {
                if back < min_back {
                    f64::NEG_INFINITY
                } else {
                    let ratio = back as f64 / period;
                    -self.tightness * ratio.ln().powi(2)
                }
            })
            .collect();

        let score_threshold = FIRST_BEAT_FRACTION * local.iter().copied().fold(0.0, f64::max);
        let mut cumscore = vec![0.0f64; n];
        let mut backlink: Vec<Option<usize>> = vec![None; n];
        let mut first_beat = true;

        for i in 0..n {
            // Predecessors before the start of the envelope score the
            // transition alone and end the sequence
            let mut best_prev: Option<usize> = None;
            let mut best_score = f64::NEG_INFINITY;
            for back in min_back..=max_back {
                let prev = i.checked_sub(back);
                let candidate = prev.map_or(0.0, |p| cumscore[p]) + transition[back];
                if candidate > best_score {
                    best_prev = prev;
                    best_score = candidate;
                }
            }

            cumscore[i] = local[i] + best_score;
            if first_beat && local[i] < score_threshold {
                backlink[i] = None;
            } else {
                backlink[i] = best_prev;
                first_beat = false;
            }
        }

        let Some(tail) = last_beat(&cumscore) else {
            return Vec::new();
        };

        let mut beats = vec![tail];
        while let Some(prev) = backlink[beats[beats.len() - 1]] {
            beats.push(prev);
        }
        beats.reverse();
        beats
    }
}

/// Envelope (scaled to unit standard deviation) smoothed by a Gaussian one
/// period wide
fn local_score(values: &[f32], period: usize) -> Option<Vec<f64>> {
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    if std <= f64::EPSILON {
        return None;
    }

    let kernel: Vec<f64> = (-(period as isize)..=period as isize)
        .map(|k| {
            let x = k as f64 * 32.0 / period as f64;
            (-0.5 * x * x).exp()
        })
        .collect();

    let half = period as isize;
    Some(
        (0..values.len() as isize)
            .map(|i| {
                kernel
                    .iter()
                    .enumerate()
                    .filter_map(|(k, &w)| {
                        let j = i + k as isize - half;
                        (j >= 0 && (j as usize) < values.len())
                            .then(|| w * values[j as usize] as f64 / std)
                    })
                    .sum()
            })
            .collect(),
    )
}

/// Last local maximum of the cumulative score above half the median of all
/// local maxima
fn last_beat(cumscore: &[f64]) -> Option<usize> {
    let n = cumscore.len();
    let is_peak = |i: usize| {
        let left = if i == 0 { f64::NEG_INFINITY } else { cumscore[i - 1] };
        let right = if i + 1 == n { f64::NEG_INFINITY } else { cumscore[i + 1] };
        cumscore[i] > left && cumscore[i] >= right
    };

    let peaks: Vec<f64> = (0..n).filter(|&i| is_peak(i)).map(|i| cumscore[i]).collect();
    if peaks.is_empty() {
        return None;
    }
    let threshold = 0.5 * crate::stats::median(&peaks);
    (0..n).rev().find(|&i| is_peak(i) && cumscore[i] > threshold)
}

/// Initial anchor: time of the first tracked beat, or 0.0 if fewer than two
/// beats were found
pub fn estimate_anchor(envelope: &OnsetEnvelope, bpm: f64, tightness: f64) -> f64 {
    let beats = BeatTracker::new(tightness).track(envelope, bpm);
    if beats.len() < 2 {
        log::debug!(
            "[BeatTracker] Only {} beat(s) tracked; anchoring at 0.0",
            beats.len()
        );
        return 0.0;
    }
    tracing::debug!(
        "[BeatTracker] {} beats tracked at {:.2} BPM, first at frame {}",
        beats.len(),
        bpm,
        beats[0]
    );
    envelope.frame_time(beats[0])
}
