use thiserror::Error;

/// Error kinds shared by every entity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Invalid,
    Conflict,
    NotFound,
    Unauthenticated,
    Unauthorized,
    Internal,
}

/// Errors returned by entity services and repositories
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Structural validation failure, fixable by the client
    #[error("{0}")]
    Invalid(String),

    /// Uniqueness or duplicate-state violation
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// No principal, or credentials that do not check out
    #[error("{0}")]
    Unauthenticated(String),

    /// Principal present but not the owner
    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::Invalid(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ServiceError::Unauthenticated(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ServiceError::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Invalid(_) => ErrorKind::Invalid,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::Database(_) | ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Client-safe message. Store and infrastructure failures never leak their details.
    pub fn message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal Server Error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
