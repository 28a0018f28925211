//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::error::AppError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required field is missing or blank.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Display name rejected.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] storegate_core::EmailError),

    /// Wrong password or unknown email. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingField(_) => Self::Validation("Please provide all fields".to_string()),
            AuthError::InvalidEmail(_) => Self::Validation("Invalid email address".to_string()),
            AuthError::InvalidName(message) | AuthError::WeakPassword(message) => {
                Self::Validation(message)
            }
            AuthError::InvalidCredentials => Self::Unauthorized,
            AuthError::UserAlreadyExists => {
                Self::Conflict("An account with this email already exists".to_string())
            }
            AuthError::Repository(err) => Self::Database(err),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_string()),
        }
    }
}
