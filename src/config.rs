//! Configuration management for parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration on thresholds without recompilation. Every
//! section has a `Default` matching the CLI defaults; command-line flags
//! override whatever the file provides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::TimingError;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub onset_detection: OnsetDetectionConfig,
    pub tempo: TempoConfig,
    pub timing: TimingConfig,
}

/// Audio loading parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Analysis sample rate; decoded audio is resampled to this rate
    pub target_sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 44_100,
        }
    }
}

/// Onset envelope and peak picking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetDetectionConfig {
    /// FFT window size in samples
    pub window_size: usize,
    /// Hop size between analysis frames
    pub hop_size: usize,
    /// Half-size of median filter window for the adaptive threshold
    pub median_window_halfsize: usize,
    /// Offset added to the local median of the (normalised) envelope
    pub threshold_offset: f32,
    /// Minimum spacing between two picked onsets
    pub min_onset_spacing_ms: f32,
    /// Upper frequency bound of the spectral onset curve
    pub max_frequency_hz: f32,
    /// Run harmonic/percussive separation and analyse the percussive part only
    pub percussive: bool,
    /// Median filter length (frames / bins) used by the percussive separation
    pub percussive_kernel: usize,
}

impl Default for OnsetDetectionConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 256,
            median_window_halfsize: 8,
            threshold_offset: 0.07,
            min_onset_spacing_ms: 30.0,
            max_frequency_hz: 8_000.0,
            percussive: false,
            percussive_kernel: 17,
        }
    }
}

/// Tempo seeding parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Expected BPM; turns the tempo prior into a Gaussian around this value
    pub bpm_hint: Option<f64>,
    /// Standard deviation (BPM) of the hint prior
    pub hint_spread: f64,
    /// Lowest tempo considered by the estimator
    pub min_bpm: f64,
    /// Highest tempo considered by the estimator
    pub max_bpm: f64,
    /// Beat tracker tightness; higher values keep beats closer to the seed period
    pub tightness: f64,
    /// BPM used when the estimate is not finite or not positive
    pub fallback_bpm: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            bpm_hint: None,
            hint_spread: 20.0,
            min_bpm: 30.0,
            max_bpm: 300.0,
            tightness: 80.0,
            fallback_bpm: 120.0,
        }
    }
}

/// What to do with the persistence counters when an action is due but the
/// candidate anchor is too close to the previous timing point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapRejectPolicy {
    /// Keep both counters; the next beat may fire the same action again
    #[default]
    Retain,
    /// Clear both counters so fresh evidence has to accumulate
    Reset,
}

/// Grid reconciliation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Max distance to match an onset to a beat (ms)
    pub match_window_ms: f64,
    /// Matched beats kept in the rolling window (minimum 8)
    pub decision_window: usize,
    /// Matched beats needed before the classifier runs
    pub min_matches: usize,
    /// Consecutive evaluations a condition must hold before acting
    pub persist: usize,
    /// Offset reset threshold on the median error (ms)
    pub offset_threshold_ms: f64,
    /// Drift threshold on the error slope (ms per beat)
    pub drift_slope_ms_per_beat: f64,
    /// Minimum BPM change to emit a drift timing point
    pub bpm_min_change: f64,
    /// Equally spaced phase shifts tested across one beat
    pub phase_divisions: usize,
    /// Seconds from the anchor used for phase scoring (minimum 3)
    pub phase_search_seconds: f64,
    /// Minimum time between timing points (ms)
    pub min_gap_ms: f64,
    /// Hard cap on timing points, seed point included
    pub max_points: usize,
    /// Counter handling when the min-gap check rejects an action
    pub gap_reject_policy: GapRejectPolicy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            match_window_ms: 40.0,
            decision_window: 24,
            min_matches: 14,
            persist: 8,
            offset_threshold_ms: 18.0,
            drift_slope_ms_per_beat: 1.2,
            bpm_min_change: 0.35,
            phase_divisions: 4,
            phase_search_seconds: 18.0,
            min_gap_ms: 600.0,
            max_points: 200,
            gap_reject_policy: GapRejectPolicy::Retain,
        }
    }
}

impl TimingConfig {
    /// Smallest rolling window the classifier will run with
    pub const MIN_WINDOW_CAPACITY: usize = 8;

    /// Match window converted to seconds
    pub fn match_window_s(&self) -> f64 {
        self.match_window_ms / 1000.0
    }

    /// Effective rolling window capacity
    pub fn window_capacity(&self) -> usize {
        self.decision_window.max(Self::MIN_WINDOW_CAPACITY)
    }

    /// Check that every threshold is usable by the engine
    pub fn validate(&self) -> Result<(), TimingError> {
        positive("match_window_ms", self.match_window_ms)?;
        non_negative("offset_threshold_ms", self.offset_threshold_ms)?;
        positive("drift_slope_ms_per_beat", self.drift_slope_ms_per_beat)?;
        non_negative("bpm_min_change", self.bpm_min_change)?;
        non_negative("phase_search_seconds", self.phase_search_seconds)?;
        non_negative("min_gap_ms", self.min_gap_ms)?;

        if self.persist == 0 {
            return Err(TimingError::invalid_config("persist", "must be >= 1"));
        }
        if self.min_matches == 0 {
            return Err(TimingError::invalid_config("min_matches", "must be >= 1"));
        }
        if self.max_points == 0 {
            return Err(TimingError::invalid_config(
                "max_points",
                "must be >= 1 (the seed point is always emitted)",
            ));
        }
        if self.min_matches > self.window_capacity() {
            log::warn!(
                "[Config] min_matches ({}) exceeds the rolling window capacity ({}); the classifier will never run",
                self.min_matches,
                self.window_capacity()
            );
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or
    /// its JSON is invalid (the failure is logged).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), TimingError> {
        if self.audio.target_sample_rate == 0 {
            return Err(TimingError::invalid_config(
                "audio.target_sample_rate",
                "must be > 0",
            ));
        }

        let onset = &self.onset_detection;
        if onset.window_size < 2 {
            return Err(TimingError::invalid_config(
                "onset_detection.window_size",
                "must be >= 2",
            ));
        }
        if onset.hop_size == 0 {
            return Err(TimingError::invalid_config(
                "onset_detection.hop_size",
                "must be >= 1",
            ));
        }
        if !onset.threshold_offset.is_finite() {
            return Err(TimingError::invalid_config(
                "onset_detection.threshold_offset",
                "must be finite",
            ));
        }
        positive(
            "onset_detection.max_frequency_hz",
            onset.max_frequency_hz as f64,
        )?;

        let tempo = &self.tempo;
        positive("tempo.min_bpm", tempo.min_bpm)?;
        positive("tempo.max_bpm", tempo.max_bpm)?;
        if tempo.min_bpm >= tempo.max_bpm {
            return Err(TimingError::invalid_config(
                "tempo.min_bpm",
                format!("must be below max_bpm ({})", tempo.max_bpm),
            ));
        }
        positive("tempo.hint_spread", tempo.hint_spread)?;
        non_negative("tempo.tightness", tempo.tightness)?;
        positive("tempo.fallback_bpm", tempo.fallback_bpm)?;
        if let Some(hint) = tempo.bpm_hint {
            positive("tempo.bpm_hint", hint)?;
        }

        self.timing.validate()
    }
}

fn positive(field: &str, value: f64) -> Result<(), TimingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TimingError::invalid_config(
            field,
            format!("must be finite and > 0 (got {})", value),
        ))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), TimingError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TimingError::invalid_config(
            field,
            format!("must be finite and >= 0 (got {})", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.audio.target_sample_rate, 44_100);
        assert_eq!(config.onset_detection.hop_size, 256);
        assert_eq!(config.tempo.tightness, 80.0);
        assert_eq!(config.timing.match_window_ms, 40.0);
        assert_eq!(config.timing.decision_window, 24);
        assert_eq!(config.timing.min_matches, 14);
        assert_eq!(config.timing.persist, 8);
        assert_eq!(config.timing.max_points, 200);
        assert_eq!(config.timing.gap_reject_policy, GapRejectPolicy::Retain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_section_defaults() {
        let json = r#"{ "timing": { "persist": 3, "gap_reject_policy": "reset" } }"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.timing.persist, 3);
        assert_eq!(parsed.timing.gap_reject_policy, GapRejectPolicy::Reset);
        assert_eq!(parsed.timing.min_matches, 14);
        assert_eq!(parsed.onset_detection, OnsetDetectionConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/definitely/not/here/timing.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_window_capacity_has_floor() {
        let timing = TimingConfig {
            decision_window: 3,
            ..TimingConfig::default()
        };
        assert_eq!(timing.window_capacity(), 8);
        assert_eq!(TimingConfig::default().window_capacity(), 24);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let timing = TimingConfig {
            match_window_ms: 0.0,
            ..TimingConfig::default()
        };
        assert!(timing.validate().is_err());

        let timing = TimingConfig {
            max_points: 0,
            ..TimingConfig::default()
        };
        assert!(timing.validate().is_err());

        let timing = TimingConfig {
            drift_slope_ms_per_beat: f64::NAN,
            ..TimingConfig::default()
        };
        assert!(timing.validate().is_err());

        let mut config = AppConfig::default();
        config.tempo.min_bpm = 200.0;
        config.tempo.max_bpm = 100.0;
        assert!(config.validate().is_err());
    }
}
