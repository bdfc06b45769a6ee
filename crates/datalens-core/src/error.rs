//! Error types for datalens

use thiserror::Error;

/// Result type alias using DataLensError
pub type Result<T> = std::result::Result<T, DataLensError>;

/// Error type alias for convenience
pub type Error = DataLensError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for datalens
#[derive(Debug, Error)]
pub enum DataLensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate document id: {0}")]
    DuplicateId(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt snapshot at {path}: {reason}")]
    CorruptSnapshot { path: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl DataLensError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DocumentNotFound(_) => exit_codes::NOT_FOUND,
            Self::InvalidInput(_) | Self::Config(_) | Self::DuplicateId(_) => {
                exit_codes::INVALID_INPUT
            }
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(
            DataLensError::DocumentNotFound("x".into()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            DataLensError::DuplicateId("x".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            DataLensError::InvalidInput("x".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            DataLensError::Embedding("x".into()).exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }
}
