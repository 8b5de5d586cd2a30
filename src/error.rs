//! Error handling for cwabin
//!
//! Job-level errors abort before any byte is written; logger-level errors
//! abort only the affected logger and are collected into the job report.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cwabin operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Main error type for conversion operations
#[derive(Error, Debug)]
pub enum ConvertError {
    // Source format errors
    #[error("Malformed sector data in {path}: {reason}")]
    MalformedSector { path: PathBuf, reason: String },

    #[error("Invalid logger header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    // Planning errors
    #[error("Empty resample window: stop {stop:.3} <= start {start:.3}")]
    EmptyWindow { start: f64, stop: f64 },

    #[error("No input files were given")]
    NoInputFiles,

    // Configuration errors
    #[error("Unsupported interpolation: {kind} (only linear is supported)")]
    UnsupportedInterpolation { kind: String },

    #[error("Invalid cutoff: {cutoff_hz} Hz at {sample_rate} Hz normalizes to {normalized:.6}, expected (0, 1)")]
    InvalidCutoff {
        cutoff_hz: f64,
        sample_rate: f64,
        normalized: f64,
    },

    #[error("Invalid parameter '{param}': {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Processing errors
    #[error("Not enough samples: need at least {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    #[error("Conversion cancelled")]
    Cancelled,

    #[error("Logger {logger} failed: {source}")]
    LoggerFailed {
        logger: String,
        #[source]
        source: Box<ConvertError>,
    },

    #[error("Worker pool error: {reason}")]
    ThreadPool { reason: String },

    // Container errors
    #[error("Invalid container: {reason}")]
    ContainerFormat { reason: String },

    // I/O errors
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    UnlocatedIo(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConvertError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ConvertError::MalformedSector { .. } => "MALFORMED_SECTOR",
            ConvertError::InvalidHeader { .. } => "INVALID_HEADER",
            ConvertError::EmptyWindow { .. } => "EMPTY_WINDOW",
            ConvertError::NoInputFiles => "NO_INPUT_FILES",
            ConvertError::UnsupportedInterpolation { .. } => "UNSUPPORTED_INTERPOLATION",
            ConvertError::InvalidCutoff { .. } => "INVALID_CUTOFF",
            ConvertError::InvalidParameter { .. } => "INVALID_PARAMETER",
            ConvertError::InsufficientSamples { .. } => "INSUFFICIENT_SAMPLES",
            ConvertError::Cancelled => "CANCELLED",
            ConvertError::LoggerFailed { .. } => "LOGGER_FAILED",
            ConvertError::ThreadPool { .. } => "THREAD_POOL",
            ConvertError::ContainerFormat { .. } => "CONTAINER_FORMAT",
            ConvertError::Io { .. } | ConvertError::UnlocatedIo(_) => "IO_ERROR",
            ConvertError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether this error stops the whole job rather than a single logger
    pub fn is_job_fatal(&self) -> bool {
        match self {
            ConvertError::EmptyWindow { .. }
            | ConvertError::NoInputFiles
            | ConvertError::UnsupportedInterpolation { .. }
            | ConvertError::InvalidCutoff { .. }
            | ConvertError::InvalidParameter { .. }
            | ConvertError::Cancelled
            | ConvertError::ThreadPool { .. } => true,
            ConvertError::LoggerFailed { .. }
            | ConvertError::MalformedSector { .. }
            | ConvertError::InvalidHeader { .. }
            | ConvertError::InsufficientSamples { .. }
            | ConvertError::ContainerFormat { .. }
            | ConvertError::Io { .. }
            | ConvertError::UnlocatedIo(_)
            | ConvertError::Serialization(_) => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ConvertError::MalformedSector { .. } => vec![
                "The recording may have been truncated while downloading",
                "Re-download the file from the logger",
            ],
            ConvertError::InvalidHeader { .. } => vec![
                "Check that the input is a logger recording and not an exported file",
            ],
            ConvertError::EmptyWindow { .. } => vec![
                "The loggers do not overlap in time",
                "Reduce the start/end trim",
                "Convert without resampling to keep each logger's own timeline",
            ],
            ConvertError::UnsupportedInterpolation { .. } => {
                vec!["Use linear interpolation"]
            }
            ConvertError::InvalidCutoff { .. } => vec![
                "Cutoff must be above 0 Hz and below half the input sample rate",
                "Lower the low-pass cutoff or raise the resample frequency",
            ],
            ConvertError::NoInputFiles => vec!["Pass at least one .cwa file or directory"],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ConvertError::EmptyWindow {
            start: 10.0,
            stop: 5.0,
        };
        assert_eq!(err.error_code(), "EMPTY_WINDOW");
        assert!(err.is_job_fatal());
    }

    #[test]
    fn test_logger_errors_are_not_job_fatal() {
        let err = ConvertError::LoggerFailed {
            logger: "6011027".to_string(),
            source: Box::new(ConvertError::MalformedSector {
                path: PathBuf::from("a.cwa"),
                reason: "trailing bytes".to_string(),
            }),
        };
        assert!(!err.is_job_fatal());
        assert!(err.to_string().contains("6011027"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = ConvertError::InvalidCutoff {
            cutoff_hz: 500.0,
            sample_rate: 800.0,
            normalized: 1.25,
        };
        assert!(!err.recovery_suggestions().is_empty());
    }
}
