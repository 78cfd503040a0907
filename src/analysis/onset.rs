// OnsetDetector - onset-strength envelope and peak picking
//
// Offline onset detection over a whole magnitude spectrogram.
//
// Algorithm:
// 1. Spectral curve: mean positive difference of log-compressed magnitudes,
//    ln(1 + |X|), over bins up to `max_frequency_hz`
// 2. Energy curve: mean positive difference of raw magnitudes over all bins
// 3. Normalise each curve by its maximum and mix: env = 0.75·spectral + 0.25·energy
// 4. Smooth with a 3-frame median filter
// 5. Peak pick: local maxima of the [0, 1]-normalised envelope that exceed
//    median(env[t-N..=t+N]) + offset, at least `min_onset_spacing_ms` apart

use super::stft::Spectrogram;
use crate::config::OnsetDetectionConfig;
use crate::stats::median_in_place_f32;

const SPECTRAL_WEIGHT: f32 = 0.75;
const ENERGY_WEIGHT: f32 = 0.25;
const NORM_EPSILON: f32 = 1e-12;

/// Onset strength per analysis frame
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl OnsetEnvelope {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Time (seconds) of a frame centre
    pub fn frame_time(&self, frame: usize) -> f64 {
        frame as f64 * self.hop_size as f64 / self.sample_rate as f64
    }

    /// Envelope frames per second
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_size as f64
    }
}

/// OnsetDetector turns a spectrogram into onset timestamps
pub struct OnsetDetector {
    median_window_halfsize: usize,
    threshold_offset: f32,
    min_onset_spacing_ms: f32,
    max_frequency_hz: f32,
}

impl OnsetDetector {
    pub fn with_config(config: &OnsetDetectionConfig) -> Self {
        Self {
            median_window_halfsize: config.median_window_halfsize.max(1),
            threshold_offset: config.threshold_offset,
            min_onset_spacing_ms: config.min_onset_spacing_ms.max(0.0),
            max_frequency_hz: config.max_frequency_hz,
        }
    }

    /// Compute the combined onset-strength envelope
    pub fn envelope(&self, spec: &Spectrogram) -> OnsetEnvelope {
        let num_frames = spec.num_frames();
        let max_bin = spec.bin_for_frequency(self.max_frequency_hz);

        let mut spectral = vec![0.0f32; num_frames];
        let mut energy = vec![0.0f32; num_frames];
        for i in 1..num_frames {
            let prev = &spec.frames[i - 1];
            let curr = &spec.frames[i];
            spectral[i] = compute_log_flux(&prev[..=max_bin], &curr[..=max_bin]);
            energy[i] = compute_spectral_flux(prev, curr) / curr.len().max(1) as f32;
        }

        normalise_by_max(&mut spectral);
        normalise_by_max(&mut energy);

        let mixed: Vec<f32> = spectral
            .iter()
            .zip(energy.iter())
            .map(|(s, e)| SPECTRAL_WEIGHT * s + ENERGY_WEIGHT * e)
            .collect();

        OnsetEnvelope {
            values: median_filter3(&mixed),
            hop_size: spec.hop_size,
            sample_rate: spec.sample_rate,
        }
    }

    /// Calculate adaptive threshold using median + offset
    ///
    /// threshold(t) = median(env[t-N..=t+N]) + offset
    fn adaptive_threshold(&self, values: &[f32], index: usize, scratch: &mut Vec<f32>) -> f32 {
        let start = index.saturating_sub(self.median_window_halfsize);
        let end = (index + self.median_window_halfsize + 1).min(values.len());
        scratch.clear();
        scratch.extend_from_slice(&values[start..end]);
        median_in_place_f32(scratch) + self.threshold_offset
    }

    /// Pick onset frames from an envelope
    ///
    /// # Returns
    /// Ascending frame indices. A flat (or empty) envelope yields no peaks.
    pub fn pick_peaks(&self, envelope: &OnsetEnvelope) -> Vec<usize> {
        let values = &envelope.values;
        if values.len() < 3 {
            return Vec::new();
        }

        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        if !range.is_finite() || range <= NORM_EPSILON {
            return Vec::new();
        }
        let normalised: Vec<f32> = values.iter().map(|v| (v - min) / range).collect();

        let min_spacing_frames =
            (self.min_onset_spacing_ms as f64 / 1000.0 * envelope.frame_rate()).ceil() as usize;
        let mut scratch = Vec::with_capacity(2 * self.median_window_halfsize + 1);
        let mut peaks: Vec<usize> = Vec::new();

        for i in 1..normalised.len() - 1 {
            let curr = normalised[i];
            if !(curr > normalised[i - 1] && curr >= normalised[i + 1]) {
                continue;
            }
            if curr <= self.adaptive_threshold(&normalised, i, &mut scratch) {
                continue;
            }
            if let Some(&last) = peaks.last() {
                if i - last < min_spacing_frames {
                    continue;
                }
            }
            peaks.push(i);
        }

        peaks
    }

    /// Onset timestamps (seconds) for a spectrogram
    pub fn detect(&self, spec: &Spectrogram) -> (OnsetEnvelope, Vec<f64>) {
        let envelope = self.envelope(spec);
        let onsets = self
            .pick_peaks(&envelope)
            .into_iter()
            .map(|frame| envelope.frame_time(frame))
            .collect();
        (envelope, onsets)
    }
}

/// Compute spectral flux as sum of positive differences
///
/// SF(t) = Σ max(0, |X_t| - |X_(t-1)|)
fn compute_spectral_flux(prev: &[f32], curr: &[f32]) -> f32 {
    curr.iter()
        .zip(prev.iter())
        .map(|(c, p)| (c - p).max(0.0))
        .sum()
}

/// Mean positive difference of ln(1 + |X|)
fn compute_log_flux(prev: &[f32], curr: &[f32]) -> f32 {
    if curr.is_empty() {
        return 0.0;
    }
    let sum: f32 = curr
        .iter()
        .zip(prev.iter())
        .map(|(c, p)| (c.ln_1p() - p.ln_1p()).max(0.0))
        .sum();
    sum / curr.len() as f32
}

fn normalise_by_max(values: &mut [f32]) {
    let max = values.iter().copied().fold(0.0f32, f32::max);
    let scale = max + NORM_EPSILON;
    for v in values.iter_mut() {
        *v /= scale;
    }
}

/// Size-3 median filter; edge frames repeat their nearest neighbour
fn median_filter3(values: &[f32]) -> Vec<f32> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let mut w = [
                values[i.saturating_sub(1)],
                values[i],
                values[(i + 1).min(n - 1)],
            ];
            median_in_place_f32(&mut w)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stft::Stft;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn envelope(values: Vec<f32>) -> OnsetEnvelope {
        OnsetEnvelope {
            values,
            hop_size: 256,
            sample_rate: 44_100,
        }
    }

    /// 20ms bursts of seeded white noise at the given positions
    fn generate_clicks(sample_rate: u32, duration_s: f32, positions_s: &[f32]) -> Vec<f32> {
        let total = (sample_rate as f32 * duration_s) as usize;
        let burst = (sample_rate as f32 * 0.02) as usize;
        let mut rng = StdRng::seed_from_u64(42);
        let click: Vec<f32> = (0..burst).map(|_| rng.gen_range(-0.5..0.5)).collect();

        let mut signal = vec![0.0; total];
        for &pos in positions_s {
            let start = (sample_rate as f32 * pos).round() as usize;
            for (offset, &sample) in click.iter().enumerate() {
                if start + offset < total {
                    signal[start + offset] += sample;
                }
            }
        }
        signal
    }

    #[test]
    fn test_spectral_flux_calculation() {
        assert_eq!(compute_spectral_flux(&[1.0; 129], &[1.0; 129]), 0.0);
        assert_eq!(compute_spectral_flux(&[1.0; 129], &[2.0; 129]), 129.0);
        // Decreases never contribute
        assert_eq!(compute_spectral_flux(&[2.0; 4], &[1.0; 4]), 0.0);
    }

    #[test]
    fn test_median_filter_removes_single_frame_spikes() {
        let filtered = median_filter3(&[0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(filtered, vec![0.0; 5]);
        let filtered = median_filter3(&[0.0, 1.0, 1.0, 0.0]);
        assert_eq!(filtered, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_peak_picking() {
        let mut values = vec![0.05f32; 60];
        for &peak in &[10usize, 30, 50] {
            values[peak - 1] = 0.5;
            values[peak] = 1.0;
            values[peak + 1] = 0.5;
        }
        let detector = OnsetDetector::with_config(&OnsetDetectionConfig::default());
        assert_eq!(detector.pick_peaks(&envelope(values)), vec![10, 30, 50]);
    }

    #[test]
    fn test_min_spacing_keeps_earlier_peak() {
        let mut values = vec![0.0f32; 40];
        values[10] = 1.0;
        values[12] = 0.9;
        let detector = OnsetDetector::with_config(&OnsetDetectionConfig::default());
        // 30ms at 172 frames/s is 6 frames
        assert_eq!(detector.pick_peaks(&envelope(values)), vec![10]);
    }

    #[test]
    fn test_flat_envelope_has_no_peaks() {
        let detector = OnsetDetector::with_config(&OnsetDetectionConfig::default());
        assert!(detector.pick_peaks(&envelope(vec![0.3; 100])).is_empty());
        assert!(detector.pick_peaks(&envelope(Vec::new())).is_empty());
    }

    #[test]
    fn test_no_false_positives_on_silence() {
        let config = OnsetDetectionConfig::default();
        let spec = Stft::new(config.window_size, config.hop_size).magnitudes(&vec![0.0; 44_100], 44_100);
        let (_, onsets) = OnsetDetector::with_config(&config).detect(&spec);
        assert!(onsets.is_empty());
    }

    #[test]
    fn test_detects_clicks_near_their_position() {
        let sample_rate = 44_100;
        let positions = [0.25f32, 0.75, 1.25, 1.75, 2.25, 2.75];
        let signal = generate_clicks(sample_rate, 3.0, &positions);

        let config = OnsetDetectionConfig::default();
        let spec = Stft::new(config.window_size, config.hop_size).magnitudes(&signal, sample_rate);
        let (envelope, onsets) = OnsetDetector::with_config(&config).detect(&spec);

        assert_eq!(envelope.len(), spec.num_frames());
        assert_eq!(onsets.len(), positions.len(), "onsets: {:?}", onsets);
        for (found, expected) in onsets.iter().zip(positions.iter()) {
            assert!(
                (found - *expected as f64).abs() < 0.03,
                "onset at {:.4}s, expected near {:.4}s",
                found,
                expected
            );
        }
    }
}
