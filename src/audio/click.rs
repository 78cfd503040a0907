//! Click track rendering
//!
//! Deterministic click tracks for fixtures and manual checks:
//! - 20ms white noise burst clicks (fixed seed, identical on every call)
//! - Beat positions computed from the beat index, never accumulated, so long
//!   renders do not drift
//! - Optional single tempo change at a given time

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Duration of one click in milliseconds
const CLICK_DURATION_MS: f32 = 20.0;

/// Peak amplitude of a click in the rendered track
const CLICK_GAIN: f32 = 0.5;

/// Generates a click sample (20ms white noise burst).
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// Exactly 20ms worth of white noise samples in range [-1.0, 1.0]
pub fn generate_click_sample(sample_rate: u32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * CLICK_DURATION_MS / 1000.0) as usize;

    // Fixed seed for deterministic noise
    let mut rng = StdRng::seed_from_u64(42);
    (0..num_samples).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Tempo layout of a click track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickPattern {
    pub bpm: f64,
    /// Time of the first click (seconds)
    pub offset: f64,
    /// Optional `(time, bpm)` after which clicks continue at the new tempo
    pub change: Option<(f64, f64)>,
}

impl ClickPattern {
    pub fn steady(bpm: f64) -> Self {
        Self {
            bpm,
            offset: 0.0,
            change: None,
        }
    }

    /// Click times (seconds) strictly before `duration`
    ///
    /// With a tempo change, the last click at or before the change time is
    /// the first beat of the new tempo.
    pub fn beat_times(&self, duration: f64) -> Vec<f64> {
        let mut times = Vec::new();
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return times;
        }

        let interval = 60.0 / self.bpm;
        let switch_at = self.change.map_or(f64::INFINITY, |(at, _)| at);
        let mut beat = 0u64;
        let mut last = self.offset;
        loop {
            let t = self.offset + beat as f64 * interval;
            if t >= duration || t > switch_at {
                break;
            }
            times.push(t);
            last = t;
            beat += 1;
        }

        if let Some((_, new_bpm)) = self.change {
            if new_bpm.is_finite() && new_bpm > 0.0 && switch_at < duration {
                let new_interval = 60.0 / new_bpm;
                let mut beat = 1u64;
                loop {
                    let t = last + beat as f64 * new_interval;
                    if t >= duration {
                        break;
                    }
                    times.push(t);
                    beat += 1;
                }
            }
        }

        times
    }
}

/// Mix one click at each of `beat_times` into a silent buffer of `duration`
pub fn render_clicks(beat_times: &[f64], duration: f64, sample_rate: u32) -> Vec<f32> {
    let total = (duration.max(0.0) * sample_rate as f64).round() as usize;
    let click = generate_click_sample(sample_rate);
    let mut samples = vec![0.0f32; total];

    for &time in beat_times {
        if time < 0.0 {
            continue;
        }
        let start = (time * sample_rate as f64).round() as usize;
        for (offset, &value) in click.iter().enumerate() {
            match samples.get_mut(start + offset) {
                Some(slot) => *slot += value * CLICK_GAIN,
                None => break,
            }
        }
    }

    samples
}

/// Render a click track for a pattern
pub fn render_click_track(pattern: &ClickPattern, duration: f64, sample_rate: u32) -> Vec<f32> {
    render_clicks(&pattern.beat_times(duration), duration, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_click_sample_duration() {
        for &sr in &[44_100, 48_000, 96_000] {
            let click = generate_click_sample(sr);
            let expected = (sr as f32 * CLICK_DURATION_MS / 1000.0) as usize;
            assert_eq!(click.len(), expected, "click should be 20ms at {} Hz", sr);
        }
    }

    #[test]
    fn test_generate_click_sample_deterministic() {
        let click = generate_click_sample(48_000);
        assert_eq!(click, generate_click_sample(48_000));
        assert!(click.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_steady_beat_times() {
        let times = ClickPattern::steady(120.0).beat_times(3.0);
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);

        let pattern = ClickPattern {
            offset: 0.25,
            ..ClickPattern::steady(120.0)
        };
        assert_eq!(pattern.beat_times(1.5), vec![0.25, 0.75, 1.25]);
    }

    #[test]
    fn test_tempo_change_continues_from_last_beat() {
        let pattern = ClickPattern {
            change: Some((1.0, 60.0)),
            ..ClickPattern::steady(120.0)
        };
        assert_eq!(pattern.beat_times(4.5), vec![0.0, 0.5, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_render_places_clicks() {
        let sample_rate = 1_000;
        let samples = render_clicks(&[0.1, 0.5], 1.0, sample_rate);
        assert_eq!(samples.len(), 1_000);
        assert!(samples[..100].iter().all(|&s| s == 0.0));
        assert!(samples[100..120].iter().any(|&s| s != 0.0));
        assert!(samples[120..500].iter().all(|&s| s == 0.0));
        assert!(samples.iter().all(|s| s.abs() <= CLICK_GAIN));
    }

    #[test]
    fn test_render_truncates_at_end() {
        let samples = render_clicks(&[0.995], 1.0, 1_000);
        assert_eq!(samples.len(), 1_000);
        assert!(samples[995..].iter().any(|&s| s != 0.0));
    }
}
