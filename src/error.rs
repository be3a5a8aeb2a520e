//! Error types for logsift

use thiserror::Error;

/// Result type alias for logsift operations
pub type Result<T> = std::result::Result<T, LogsiftError>;

/// Main error type for the detection pipeline
#[derive(Error, Debug)]
pub enum LogsiftError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LogsiftError {
    /// Whether this error is the opaque internal-failure kind reported to callers
    pub fn is_internal(&self) -> bool {
        matches!(self, LogsiftError::ComputationError(_))
    }
}

impl From<serde_json::Error> for LogsiftError {
    fn from(err: serde_json::Error) -> Self {
        LogsiftError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LogsiftError {
    fn from(err: ndarray::ShapeError) -> Self {
        LogsiftError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LogsiftError::ComputationError("scores diverged".to_string());
        assert_eq!(err.to_string(), "Computation error: scores diverged");
        assert!(err.is_internal());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LogsiftError = io_err.into();
        assert!(matches!(err, LogsiftError::IoError(_)));
        assert!(!err.is_internal());
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = LogsiftError::InvalidParameter {
            name: "n_estimators".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid parameter: n_estimators = 0, must be at least 1"
        );
    }
}
