//! Error types for the discovery engine

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Broad failure class, used by callers to pick a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad configuration, rejected before any fitting starts
    Configuration,
    /// Labeling or column contents that cannot support a run
    DataValidity,
    /// Surrogate fitting failed numerically
    Numerical,
    /// Loading or writing tables
    Io,
}

/// Main error type for the discovery engine
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid experiment configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid experiment data: {0}")]
    InvalidData(String),

    #[error("Value not supported: {0}")]
    ValueNotSupported(String),

    #[error("Model fit failed for target '{target}': {reason}")]
    ModelFit { target: String, reason: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DiscoveryError {
    /// Classify the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            DiscoveryError::InvalidConfiguration(_)
            | DiscoveryError::ValueNotSupported(_)
            | DiscoveryError::SerializationError(_) => ErrorCategory::Configuration,
            DiscoveryError::InvalidData(_)
            | DiscoveryError::ColumnNotFound(_)
            | DiscoveryError::DataError(_) => ErrorCategory::DataValidity,
            DiscoveryError::ModelFit { .. }
            | DiscoveryError::TrainingError(_)
            | DiscoveryError::ModelNotFitted
            | DiscoveryError::ShapeError { .. } => ErrorCategory::Numerical,
            DiscoveryError::IoError(_) => ErrorCategory::Io,
        }
    }

    /// True for configuration and data-validity failures of an experiment
    pub fn is_invalid_experiment(&self) -> bool {
        matches!(
            self,
            DiscoveryError::InvalidConfiguration(_) | DiscoveryError::InvalidData(_)
        )
    }
}

impl From<polars::error::PolarsError> for DiscoveryError {
    fn from(err: polars::error::PolarsError) -> Self {
        DiscoveryError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DiscoveryError {
    fn from(err: ndarray::ShapeError) -> Self {
        DiscoveryError::ShapeError {
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
        let err = DiscoveryError::ModelFit {
            target: "strength".to_string(),
            reason: "matrix not positive definite".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Model fit failed for target 'strength': matrix not positive definite"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DiscoveryError = io_err.into();
        assert!(matches!(err, DiscoveryError::IoError(_)));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_invalid_experiment_classification() {
        assert!(DiscoveryError::InvalidData("no labels".into()).is_invalid_experiment());
        assert!(DiscoveryError::InvalidConfiguration("no targets".into()).is_invalid_experiment());
        assert!(!DiscoveryError::ValueNotSupported("svm".into()).is_invalid_experiment());
        assert_eq!(
            DiscoveryError::InvalidData("x".into()).category(),
            ErrorCategory::DataValidity
        );
    }
}
