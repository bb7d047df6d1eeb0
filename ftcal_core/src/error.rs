use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalError {
    /// A raw record or frame could not be decoded. Callers skip it and continue.
    #[error("malformed record: {0}")]
    Format(String),
    /// A dataset file does not carry the expected columns. The whole file is excluded.
    #[error("schema mismatch in {path:?}: {reason}")]
    SchemaMismatch { path: PathBuf, reason: String },
    #[error("insufficient data: {rows} training rows for {features} features")]
    InsufficientData { rows: usize, features: usize },
    #[error("solver failed: {0}")]
    Solver(String),
    /// A device read produced nothing in time; the tick is skipped like a malformed one.
    #[error("timeout waiting for device")]
    Timeout,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CalError {
    fn from(e: std::io::Error) -> Self {
        CalError::Io(e.to_string())
    }
}

impl From<csv::Error> for CalError {
    fn from(e: csv::Error) -> Self {
        CalError::Io(e.to_string())
    }
}

/// Map a trait-boundary error to a typed `CalError`.
///
/// Downcasts `ftcal_hardware::HwError` when that crate is linked, then falls back
/// to string-based detection of timeouts.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CalError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<ftcal_hardware::HwError>() {
            return match hw {
                ftcal_hardware::HwError::Timeout => CalError::Timeout,
                other => CalError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timed out") || s.to_lowercase().contains("timeout") {
        CalError::Timeout
    } else {
        CalError::Hardware(s)
    }
}

pub type Result<T, E = CalError> = std::result::Result<T, E>;
