//! Service error type

use permit_storage::StorageError;
use permit_types::{ErrorKind, PermitError};
use thiserror::Error;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Permit error: {0}")]
    Permit(#[from] PermitError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// True when the operation lost an optimistic-concurrency race and can
    /// be retried against a fresh snapshot
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Storage(e) if e.is_retryable())
    }

    /// Category as seen by an end user
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Permit(e) => e.kind(),
            ServiceError::Storage(StorageError::NotFound(_)) => ErrorKind::NotFound,
            ServiceError::Storage(StorageError::InvalidInput(_)) => ErrorKind::InvalidArgument,
            ServiceError::Storage(_) | ServiceError::Config(_) => ErrorKind::DependencyFailure,
        }
    }
}
