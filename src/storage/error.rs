//! Error types for session persistence

use std::fmt;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Name cannot be used as a file or directory name
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
}

impl StorageError {
    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Check if the error is retryable
    ///
    /// A failed save is retried on the next state change, so only transient
    /// I/O conditions qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(err) => !matches!(
                err.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            Self::Serialization(_) | Self::NotFound(_) | Self::InvalidName(_) => false,
        }
    }
}

impl From<serde_yaml::Error> for StorageError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err)
    }
}
