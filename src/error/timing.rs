// Grid reconciliation error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Timing error code constants
///
/// Error code range: 2001-2003
pub struct TimingErrorCodes {}

impl TimingErrorCodes {
    /// A configuration value is out of range
    pub const INVALID_CONFIG: i32 = 2001;

    /// Audio duration is negative or not finite
    pub const INVALID_DURATION: i32 = 2002;

    /// Seed anchor is not finite
    pub const INVALID_ANCHOR: i32 = 2003;
}

/// Log a timing error with structured context
pub fn log_timing_error(err: &TimingError, context: &str) {
    error!(
        "Timing error in {}: code={}, component=GridEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the grid reconciliation core
///
/// Degenerate estimates (bad seed BPM, near-zero intervals) are not errors;
/// they fall back to safe values. Only inputs the core cannot reason about
/// are rejected here.
///
/// Error code ranges: 2001-2003
#[derive(Debug, Clone, PartialEq)]
pub enum TimingError {
    /// Configuration field out of range
    InvalidConfig { field: String, reason: String },

    /// Duration must be finite and >= 0
    InvalidDuration { duration: f64 },

    /// Seed anchor must be finite
    InvalidAnchor { anchor: f64 },
}

impl TimingError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        TimingError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for TimingError {
    fn code(&self) -> i32 {
        match self {
            TimingError::InvalidConfig { .. } => TimingErrorCodes::INVALID_CONFIG,
            TimingError::InvalidDuration { .. } => TimingErrorCodes::INVALID_DURATION,
            TimingError::InvalidAnchor { .. } => TimingErrorCodes::INVALID_ANCHOR,
        }
    }

    fn message(&self) -> String {
        match self {
            TimingError::InvalidConfig { field, reason } => {
                format!("Invalid config value for {}: {}", field, reason)
            }
            TimingError::InvalidDuration { duration } => {
                format!("Duration must be finite and non-negative (got {})", duration)
            }
            TimingError::InvalidAnchor { anchor } => {
                format!("Seed anchor must be finite (got {})", anchor)
            }
        }
    }
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimingError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TimingError {}
