// Percussive component - median-filter harmonic/percussive separation
//
// Harmonic energy is smooth along time, percussive energy is smooth along
// frequency. Median filtering the magnitude spectrogram in each direction
// gives a harmonic and a percussive estimate; the percussive soft mask
//
//   M = P² / (H² + P²)
//
// is applied to the magnitudes directly. Onset analysis runs on the masked
// spectrogram, so no inverse transform is needed.

use super::stft::Spectrogram;
use crate::stats::median_in_place_f32;

const MASK_EPSILON: f32 = 1e-10;

/// Median of `values[center - half ..= center + half]`, clamped to the slice
fn windowed_median(values: &[f32], center: usize, half: usize, scratch: &mut Vec<f32>) -> f32 {
    let start = center.saturating_sub(half);
    let end = (center + half + 1).min(values.len());
    scratch.clear();
    scratch.extend_from_slice(&values[start..end]);
    median_in_place_f32(scratch)
}

/// Keep only the percussive part of a magnitude spectrogram
///
/// # Arguments
/// * `spec` - Magnitude spectrogram
/// * `kernel` - Median filter length in frames (harmonic) and bins (percussive)
pub fn percussive_component(spec: &Spectrogram, kernel: usize) -> Spectrogram {
    let num_frames = spec.num_frames();
    if num_frames == 0 {
        return spec.clone();
    }
    let num_bins = spec.num_bins();
    let half = kernel.max(1) / 2;
    let mut scratch = Vec::with_capacity(2 * half + 1);

    // Harmonic estimate: median over time for each bin
    let mut harmonic = vec![vec![0.0f32; num_bins]; num_frames];
    let mut column = vec![0.0f32; num_frames];
    for bin in 0..num_bins {
        for (frame, value) in column.iter_mut().enumerate() {
            *value = spec.frames[frame][bin];
        }
        for (frame, row) in harmonic.iter_mut().enumerate() {
            row[bin] = windowed_median(&column, frame, half, &mut scratch);
        }
    }

    let frames = spec
        .frames
        .iter()
        .zip(harmonic.iter())
        .map(|(row, harmonic_row)| {
            row.iter()
                .enumerate()
                .map(|(bin, &magnitude)| {
                    // Percussive estimate: median over frequency for this frame
                    let p = windowed_median(row, bin, half, &mut scratch);
                    let h = harmonic_row[bin];
                    let p2 = p * p;
                    let mask = p2 / (p2 + h * h + MASK_EPSILON);
                    magnitude * mask
                })
                .collect()
        })
        .collect();

    log::debug!(
        "[Percussive] Separated {} frames x {} bins (kernel {})",
        num_frames,
        num_bins,
        2 * half + 1
    );

    Spectrogram {
        frames,
        window_size: spec.window_size,
        hop_size: spec.hop_size,
        sample_rate: spec.sample_rate,
    }
}
