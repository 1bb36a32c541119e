//! Error types for the permit layer

/// Errors produced by permit workflow operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermitError {
    /// Wrong actor or role for the current gate
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Action attempted on a terminal or out-of-sequence permit
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unknown gate/stage name, missing mandatory remarks, bad dates
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced permit or parent permit missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Directory or dispatcher unavailable
    #[error("Dependency failure: {0}")]
    DependencyFailure(String),

    /// A produced snapshot breaks a lifecycle invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Coarse error category, for callers that branch on the kind only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    InvalidState,
    InvalidArgument,
    NotFound,
    DependencyFailure,
    InvariantViolation,
}

impl PermitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PermitError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            PermitError::InvalidState(_) => ErrorKind::InvalidState,
            PermitError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PermitError::NotFound(_) => ErrorKind::NotFound,
            PermitError::DependencyFailure(_) => ErrorKind::DependencyFailure,
            PermitError::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }
}

/// Result type alias for permit operations
pub type PermitResult<T> = Result<T, PermitError>;
