//! Synthetic onset streams and click fixtures.
//!
//! Onset generators mirror the situations the grid engine has to tell apart:
//! a steady tempo, a tempo change, and a constant phase shift. Jitter and
//! dropouts come from a seeded `StdRng`, so every fixture is reproducible.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::Path;

use crate::audio::{render_click_track, write_wav, ClickPattern};
use crate::error::AudioError;

/// Onsets at `start + i·60/bpm` for `i in 0..count`
pub fn steady_onsets(bpm: f64, start: f64, count: usize) -> Vec<f64> {
    let interval = 60.0 / bpm;
    (0..count).map(|i| start + i as f64 * interval).collect()
}

/// Steady `bpm_before` from 0 up to and including `change_at`, then
/// `bpm_after` (accumulated from the last beat) until `duration`
pub fn tempo_change_onsets(bpm_before: f64, bpm_after: f64, change_at: f64, duration: f64) -> Vec<f64> {
    let before = 60.0 / bpm_before;
    let after = 60.0 / bpm_after;

    let mut onsets: Vec<f64> = (0..)
        .map(|i| i as f64 * before)
        .take_while(|&t| t <= change_at)
        .collect();

    let mut t = onsets.last().copied().unwrap_or(0.0);
    loop {
        t += after;
        if t >= duration {
            break;
        }
        onsets.push(t);
    }
    onsets
}

/// Steady onsets where every beat from `from_beat` on lands `shift_s` late
pub fn shifted_onsets(bpm: f64, shift_s: f64, from_beat: usize, count: usize) -> Vec<f64> {
    let interval = 60.0 / bpm;
    (0..count)
        .map(|i| {
            let t = i as f64 * interval;
            if i >= from_beat {
                t + shift_s
            } else {
                t
            }
        })
        .collect()
}

/// Add uniform jitter in `[-max_jitter_s, max_jitter_s]` to every onset
pub fn jitter(onsets: &[f64], max_jitter_s: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    onsets
        .iter()
        .map(|&t| {
            if max_jitter_s > 0.0 {
                t + rng.gen_range(-max_jitter_s..=max_jitter_s)
            } else {
                t
            }
        })
        .collect()
}

/// Randomly drop onsets, keeping each with probability `keep`
pub fn drop_onsets(onsets: &[f64], keep: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let keep = keep.clamp(0.0, 1.0);
    onsets
        .iter()
        .copied()
        .filter(|_| rng.gen_bool(keep))
        .collect()
}

/// Render a click track and write it as a 16-bit WAV
pub fn write_click_fixture<P: AsRef<Path>>(
    path: P,
    pattern: &ClickPattern,
    duration: f64,
    sample_rate: u32,
) -> Result<(), AudioError> {
    let samples = render_click_track(pattern, duration, sample_rate);
    write_wav(path, &samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_onsets() {
        assert_eq!(steady_onsets(120.0, 0.25, 4), vec![0.25, 0.75, 1.25, 1.75]);
    }

    #[test]
    fn test_tempo_change_onsets() {
        let onsets = tempo_change_onsets(120.0, 60.0, 1.0, 4.0);
        assert_eq!(onsets, vec![0.0, 0.5, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_shifted_onsets() {
        let onsets = shifted_onsets(120.0, 0.03, 2, 4);
        assert_eq!(onsets[..2], [0.0, 0.5]);
        assert!((onsets[2] - 1.03).abs() < 1e-12);
        assert!((onsets[3] - 1.53).abs() < 1e-12);
    }

    #[test]
    fn test_jitter_is_bounded_and_seeded() {
        let base = steady_onsets(120.0, 1.0, 50);
        let a = jitter(&base, 0.005, 7);
        let b = jitter(&base, 0.005, 7);
        assert_eq!(a, b);
        assert!(a.iter().zip(&base).all(|(j, t)| (j - t).abs() <= 0.005));
        assert_ne!(a, jitter(&base, 0.005, 8));
    }

    #[test]
    fn test_drop_onsets_keeps_order() {
        let base = steady_onsets(120.0, 0.0, 200);
        let kept = drop_onsets(&base, 0.8, 3);
        assert!(kept.len() < base.len());
        assert!(kept.len() > 100);
        assert!(kept.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(drop_onsets(&base, 1.0, 3), base);
    }
}
