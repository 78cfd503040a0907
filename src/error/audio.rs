// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported by the CLI.
///
/// Error code range: 1001-1006
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Audio file could not be opened
    pub const OPEN_FAILED: i32 = 1001;

    /// Audio file could not be decoded
    pub const DECODE_FAILED: i32 = 1002;

    /// Sample format is not supported
    pub const UNSUPPORTED_FORMAT: i32 = 1003;

    /// Decoded signal contains no samples
    pub const EMPTY_SIGNAL: i32 = 1004;

    /// Sample rate is invalid
    pub const INVALID_SAMPLE_RATE: i32 = 1005;

    /// Output (report or rendered audio) could not be written
    pub const WRITE_FAILED: i32 = 1006;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioLoader, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover loading, decoding and writing audio. All of them are
/// input-fatal: the CLI reports them and exits with status 1.
///
/// Error code ranges: 1001-1006
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Failed to open the audio file
    OpenFailed { path: String, reason: String },

    /// Failed while reading/decoding samples
    DecodeFailed { path: String, reason: String },

    /// Sample format or bit depth is not supported
    UnsupportedFormat { details: String },

    /// Signal contains no samples
    EmptySignal,

    /// Sample rate must be > 0
    InvalidSampleRate { sample_rate: u32 },

    /// Failed to write output
    WriteFailed { path: String, reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::OpenFailed { .. } => AudioErrorCodes::OPEN_FAILED,
            AudioError::DecodeFailed { .. } => AudioErrorCodes::DECODE_FAILED,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::EmptySignal => AudioErrorCodes::EMPTY_SIGNAL,
            AudioError::InvalidSampleRate { .. } => AudioErrorCodes::INVALID_SAMPLE_RATE,
            AudioError::WriteFailed { .. } => AudioErrorCodes::WRITE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::OpenFailed { path, reason } => {
                format!("Failed to open {}: {}", path, reason)
            }
            AudioError::DecodeFailed { path, reason } => {
                format!("Error reading {}: {}", path, reason)
            }
            AudioError::UnsupportedFormat { details } => {
                format!("Unsupported audio format: {}", details)
            }
            AudioError::EmptySignal => "Empty audio.".to_string(),
            AudioError::InvalidSampleRate { sample_rate } => {
                format!("Sample rate must be greater than 0 (got {})", sample_rate)
            }
            AudioError::WriteFailed { path, reason } => {
                format!("Failed to write {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}
