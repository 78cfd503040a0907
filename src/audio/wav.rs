// WAV input/output
//
// Decoding goes through hound. Multi-channel files are mixed down to mono by
// averaging, and the result is resampled (linear interpolation) to the
// analysis rate. Rendered audio is written as 16-bit PCM mono.

use std::path::Path;

use crate::error::AudioError;

/// Decoded mono audio at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn read_wav(path: &Path) -> Result<MonoAudio, AudioError> {
    let display = path.display().to_string();
    let decode_error = |err: hound::Error| AudioError::DecodeFailed {
        path: display.clone(),
        reason: err.to_string(),
    };

    let mut reader = hound::WavReader::open(path).map_err(|err| AudioError::OpenFailed {
        path: display.clone(),
        reason: err.to_string(),
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedFormat {
            details: format!("{} has zero channels", display),
        });
    }
    if spec.sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate {
            sample_rate: spec.sample_rate,
        });
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(decode_error))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|sample| sample.map(|v| v as f32 / i8::MAX as f32).map_err(decode_error))
                .collect::<Result<Vec<f32>, _>>()?,
            16 => reader
                .samples::<i16>()
                .map(|sample| sample.map(|v| v as f32 / i16::MAX as f32).map_err(decode_error))
                .collect::<Result<Vec<f32>, _>>()?,
            24 => reader
                .samples::<i32>()
                .map(|sample| {
                    sample
                        .map(|v| v as f32 / ((1 << 23) - 1) as f32)
                        .map_err(decode_error)
                })
                .collect::<Result<Vec<f32>, _>>()?,
            32 => reader
                .samples::<i32>()
                .map(|sample| sample.map(|v| v as f32 / i32::MAX as f32).map_err(decode_error))
                .collect::<Result<Vec<f32>, _>>()?,
            bits => {
                return Err(AudioError::UnsupportedFormat {
                    details: format!("bits_per_sample={} in {}", bits, display),
                })
            }
        },
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Resample with linear interpolation
///
/// Output length is `round(len · to / from)`; identical rates return a copy.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = position.floor() as usize;
            if index >= last {
                return samples[last];
            }
            let frac = (position - index as f64) as f32;
            samples[index] * (1.0 - frac) + samples[index + 1] * frac
        })
        .collect()
}

/// Load a WAV file as mono audio at `target_sample_rate`
///
/// # Errors
/// `OpenFailed`, `DecodeFailed`, `UnsupportedFormat`, `InvalidSampleRate`,
/// or `EmptySignal` when the file holds no samples.
pub fn load_wav<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<MonoAudio, AudioError> {
    if target_sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate {
            sample_rate: target_sample_rate,
        });
    }

    let decoded = read_wav(path.as_ref())?;
    if decoded.samples.is_empty() {
        return Err(AudioError::EmptySignal);
    }

    if decoded.sample_rate == target_sample_rate {
        return Ok(decoded);
    }

    log::debug!(
        "[AudioLoader] Resampling {:?} from {} Hz to {} Hz",
        path.as_ref(),
        decoded.sample_rate,
        target_sample_rate
    );
    Ok(MonoAudio {
        samples: resample_linear(&decoded.samples, decoded.sample_rate, target_sample_rate),
        sample_rate: target_sample_rate,
    })
}

/// Write mono samples as 16-bit PCM
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let display = path.as_ref().display().to_string();
    let write_error = |err: hound::Error| AudioError::WriteFailed {
        path: display.clone(),
        reason: err.to_string(),
    };

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path.as_ref(), spec).map_err(write_error)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)
}
