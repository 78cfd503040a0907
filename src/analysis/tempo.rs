// Tempo seeding - autocorrelation of the onset envelope weighted by a prior
//
// The envelope's autocorrelation (computed with an FFT) has peaks at lags
// that are multiples of the beat period. Each lag inside [min_bpm, max_bpm]
// is scored as
//
//   score(lag) = ln(1 + 1e6 · ac[lag] / ac[0]) + ln(prior(bpm(lag)))
//
// and the best lag is refined with parabolic interpolation. The prior is a
// log-normal around 120 BPM (one octave std) by default, or a Gaussian around
// the BPM hint when one is given.

use rustfft::{num_complex::Complex, FftPlanner};

use super::onset::OnsetEnvelope;
use crate::config::TempoConfig;

/// Centre of the default (hint-free) tempo prior
pub const DEFAULT_PRIOR_BPM: f64 = 120.0;

/// Standard deviation of the default prior, in octaves
const DEFAULT_PRIOR_OCTAVES: f64 = 1.0;

const AC_SCALE: f64 = 1e6;

/// Log of the tempo prior
fn log_tempo_prior(bpm: f64, hint: Option<f64>, spread: f64) -> f64 {
    match hint {
        Some(hint) => {
            let z = (bpm - hint) / spread;
            -0.5 * z * z
        }
        None => {
            let z = (bpm.log2() - DEFAULT_PRIOR_BPM.log2()) / DEFAULT_PRIOR_OCTAVES;
            -0.5 * z * z
        }
    }
}

/// Prior weight of a tempo (1.0 at the centre)
///
/// # Arguments
/// * `bpm` - Candidate tempo
/// * `hint` - Expected tempo; `None` uses a log-normal around 120 BPM
/// * `spread` - Standard deviation (BPM) of the hint Gaussian
pub fn tempo_prior(bpm: f64, hint: Option<f64>, spread: f64) -> f64 {
    log_tempo_prior(bpm, hint, spread).exp()
}

/// Result of tempo estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f64,
    /// Normalised autocorrelation at the chosen lag (0 when falling back)
    pub strength: f64,
    /// Whether the configured fallback tempo was used
    pub fallback: bool,
}

pub struct TempoEstimator {
    min_bpm: f64,
    max_bpm: f64,
    hint: Option<f64>,
    hint_spread: f64,
    fallback_bpm: f64,
}

impl TempoEstimator {
    pub fn from_config(config: &TempoConfig) -> Self {
        Self {
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            hint: config.bpm_hint,
            hint_spread: config.hint_spread,
            fallback_bpm: config.fallback_bpm,
        }
    }

    fn fallback(&self, reason: &str) -> TempoEstimate {
        log::warn!(
            "[TempoEstimator] {}; using fallback {:.2} BPM",
            reason,
            self.fallback_bpm
        );
        TempoEstimate {
            bpm: self.fallback_bpm,
            strength: 0.0,
            fallback: true,
        }
    }

    /// Estimate the dominant tempo of an onset envelope
    pub fn estimate(&self, envelope: &OnsetEnvelope) -> TempoEstimate {
        let frame_rate = envelope.frame_rate();
        let ac = autocorrelate(&envelope.values);
        if ac.len() < 3 || ac[0] <= f64::EPSILON {
            return self.fallback("Onset envelope is empty or silent");
        }

        let min_lag = ((60.0 * frame_rate / self.max_bpm).ceil() as usize).max(1);
        let max_lag = ((60.0 * frame_rate / self.min_bpm).floor() as usize).min(ac.len() - 2);
        if min_lag > max_lag {
            return self.fallback("Envelope too short for the configured tempo range");
        }

        let mut best: Option<(usize, f64)> = None;
        for lag in min_lag..=max_lag {
            let bpm = 60.0 * frame_rate / lag as f64;
            let normalised = (ac[lag] / ac[0]).max(0.0);
            let score = (AC_SCALE * normalised).ln_1p()
                + log_tempo_prior(bpm, self.hint, self.hint_spread);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((lag, score));
            }
        }
        let Some((lag, _)) = best else {
            return self.fallback("No tempo candidate in range");
        };

        let refined_lag = lag as f64 + parabolic_offset(ac[lag - 1], ac[lag], ac[lag + 1]);
        let bpm = 60.0 * frame_rate / refined_lag;
        if !bpm.is_finite() || bpm <= 0.0 {
            return self.fallback("Tempo estimate is not finite");
        }

        let strength = ac[lag] / ac[0];
        tracing::debug!(
            "[TempoEstimator] lag {} ({:.3} refined) -> {:.2} BPM, strength {:.3}, hint {:?}",
            lag,
            refined_lag,
            bpm,
            strength,
            self.hint
        );

        TempoEstimate {
            bpm,
            strength,
            fallback: false,
        }
    }
}

/// Vertex offset (in samples, within ±0.5) of the parabola through three points
fn parabolic_offset(left: f64, centre: f64, right: f64) -> f64 {
    let denominator = left - 2.0 * centre + right;
    if denominator >= 0.0 {
        // Not a local maximum
        return 0.0;
    }
    (0.5 * (left - right) / denominator).clamp(-0.5, 0.5)
}

/// Linear autocorrelation via FFT: ac[k] = Σ x[i]·x[i+k]
pub fn autocorrelate(values: &[f32]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let size = (2 * n).next_power_of_two();
    let mut buffer: Vec<Complex<f64>> = values
        .iter()
        .map(|&v| Complex::new(v as f64, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(size)
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(size).process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(size).process(&mut buffer);

    buffer[..n].iter().map(|c| c.re / size as f64).collect()
}
