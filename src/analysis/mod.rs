// Analysis module - offline DSP front end feeding the grid core
//
// Pipeline:
//   samples → STFT → (optional percussive mask) → onset envelope → onset peaks
//           → tempo seed (autocorrelation + prior) → anchor seed (DP beat tracker)
//           → anchor snap → grid::generate_timing_points
//
// Everything runs once over the whole signal. Decoding and resampling happen
// before this module (see `audio::load_wav`).

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::error::AudioError;
use crate::grid::{generate_timing_points, OnsetSet, TimingResult};

pub mod anchor;
pub mod onset;
pub mod percussive;
pub mod stft;
pub mod tempo;

use onset::OnsetDetector;
use stft::Stft;
use tempo::{TempoEstimate, TempoEstimator};

/// Anchor snapping reaches this many match windows
pub const ANCHOR_SNAP_WINDOWS: f64 = 2.5;

/// Everything one analysis pass produced
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Signal length in seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub onsets: OnsetSet,
    pub tempo: TempoEstimate,
    /// First beat of the DP beat tracker
    pub tracked_anchor: f64,
    /// Anchor handed to the grid core (after snapping)
    pub seed_anchor: f64,
    pub timing: TimingResult,
}

/// Snap `anchor` onto the nearest onset if it lies within
/// `ANCHOR_SNAP_WINDOWS` match windows; otherwise return it unchanged
pub fn snap_anchor(anchor: f64, onsets: &OnsetSet, window_s: f64) -> f64 {
    let nearest = onsets
        .as_slice()
        .iter()
        .copied()
        .min_by(|a, b| (a - anchor).abs().total_cmp(&(b - anchor).abs()));

    match nearest {
        Some(onset) if (onset - anchor).abs() <= window_s * ANCHOR_SNAP_WINDOWS => onset,
        _ => anchor,
    }
}

/// Run the full analysis on a mono signal
///
/// # Arguments
/// * `samples` - Mono samples
/// * `sample_rate` - Sample rate of `samples` in Hz
/// * `config` - Full application configuration
///
/// # Errors
/// `AudioError::EmptySignal` / `AudioError::InvalidSampleRate` for unusable
/// input, `TimingError` for invalid configuration.
pub fn analyze_samples(samples: &[f32], sample_rate: u32, config: &AppConfig) -> Result<AnalysisReport> {
    if sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate { sample_rate }.into());
    }
    if samples.is_empty() {
        return Err(AudioError::EmptySignal.into());
    }
    config.validate().context("invalid analysis configuration")?;

    let duration = samples.len() as f64 / sample_rate as f64;
    let onset_config = &config.onset_detection;

    let stft = Stft::new(onset_config.window_size, onset_config.hop_size);
    let mut spectrogram = stft.magnitudes(samples, sample_rate);
    if onset_config.percussive {
        spectrogram = percussive::percussive_component(&spectrogram, onset_config.percussive_kernel);
    }

    let detector = OnsetDetector::with_config(onset_config);
    let (envelope, onset_times) = detector.detect(&spectrogram);
    let onsets = OnsetSet::new(onset_times);
    tracing::debug!(
        "[Analysis] {:.2}s of audio: {} frames, {} onsets",
        duration,
        envelope.len(),
        onsets.len()
    );

    let tempo = TempoEstimator::from_config(&config.tempo).estimate(&envelope);
    let tracked_anchor = anchor::estimate_anchor(&envelope, tempo.bpm, config.tempo.tightness);
    let seed_anchor = snap_anchor(tracked_anchor, &onsets, config.timing.match_window_s());

    tracing::info!(
        "[Analysis] Seed: {:.2} BPM, anchor {:.4}s (tracked {:.4}s)",
        tempo.bpm,
        seed_anchor,
        tracked_anchor
    );

    let timing = generate_timing_points(&onsets, tempo.bpm, seed_anchor, duration, &config.timing)
        .context("grid reconciliation failed")?;

    Ok(AnalysisReport {
        duration,
        sample_rate,
        onsets,
        tempo,
        tracked_anchor,
        seed_anchor,
        timing,
    })
}
