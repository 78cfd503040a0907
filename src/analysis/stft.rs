// STFT module - framewise magnitude spectra
//
// Frames are centred: the signal is zero-padded by half a window on both
// sides, so frame `i` is centred on sample `i * hop`. Every frame is Hann
// windowed before the FFT and only the non-negative frequency bins are kept.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Magnitude spectrogram, one row of `window_size / 2 + 1` bins per frame
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub window_size: usize,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    /// Index of the highest bin at or below `frequency_hz`
    pub fn bin_for_frequency(&self, frequency_hz: f32) -> usize {
        let bin = (frequency_hz * self.window_size as f32 / self.sample_rate as f32).floor();
        (bin.max(0.0) as usize).min(self.num_bins() - 1)
    }
}

/// Short-time Fourier transform with a fixed window and hop
pub struct Stft {
    fft: Arc<dyn Fft<f32>>,
    window_size: usize,
    hop_size: usize,
    /// Hann window (pre-computed)
    window: Vec<f32>,
}

impl Stft {
    /// # Arguments
    /// * `window_size` - FFT size in samples (clamped to at least 2)
    /// * `hop_size` - Samples between frame centres (clamped to at least 1)
    pub fn new(window_size: usize, hop_size: usize) -> Self {
        let window_size = window_size.max(2);
        let window = (0..window_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (window_size as f32 - 1.0)).cos())
            })
            .collect();

        Self {
            fft: FftPlanner::new().plan_fft_forward(window_size),
            window_size,
            hop_size: hop_size.max(1),
            window,
        }
    }

    /// Number of centred frames produced for `num_samples` input samples
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples == 0 {
            0
        } else {
            1 + num_samples / self.hop_size
        }
    }

    /// Compute the magnitude spectrogram of `samples`
    pub fn magnitudes(&self, samples: &[f32], sample_rate: u32) -> Spectrogram {
        let half = self.window_size / 2;
        let num_frames = self.num_frames(samples.len());
        let mut frames = Vec::with_capacity(num_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.window_size];

        for frame in 0..num_frames {
            // Frame start in unpadded coordinates (may be negative)
            let start = (frame * self.hop_size) as isize - half as isize;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let pos = start + i as isize;
                let sample = if pos >= 0 && (pos as usize) < samples.len() {
                    samples[pos as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.fft.process(&mut buffer);
            frames.push(buffer[..=half].iter().map(|c| c.norm()).collect());
        }

        Spectrogram {
            frames,
            window_size: self.window_size,
            hop_size: self.hop_size,
            sample_rate,
        }
    }
}
