// Error types for the timing point generator
//
// This module defines custom error types for audio loading and grid
// reconciliation, providing structured error handling with numeric codes
// that the CLI reports alongside the message.

mod audio;
mod timing;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use timing::{log_timing_error, TimingError, TimingErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error reporting across
/// the library and the command-line front end.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
