//! Unified error handling with Sentry integration.
//!
//! Every stage of the ingress pipeline and every route handler returns
//! `Result<T, AppError>`. `AppError::into_response` is the single place where
//! failures become HTTP responses: client-class errors get a short generic
//! message, server-class errors are logged and captured to Sentry and the
//! client only sees `Internal server error`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request path is hidden or otherwise denied.
    #[error("Forbidden")]
    Forbidden,

    /// Malformed request body or parameters.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Input failed validation. The message is written for the client.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing or invalid session.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found. The message names the resource and is shown to the client.
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint conflict (e.g. email already registered).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request body exceeded the configured limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// A dependency (the database) is not ready yet.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(&'static str),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) | Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::Database(RepositoryError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    ///
    /// Never includes paths, SQL, or the wrapped error's text.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Forbidden => "Access Denied".to_string(),
            Self::BadRequest(_) => "Bad request".to_string(),
            Self::Validation(message) | Self::Conflict(message) => message.clone(),
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::NotFound(resource) => format!("{resource} not found"),
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(_)) => "Conflict".to_string(),
            Self::PayloadTooLarge => "Payload too large".to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl AppError {
    /// Log the error, capturing server errors to Sentry.
    pub fn report(&self) {
        let status = self.status();

        if status.is_server_error() && !matches!(self, Self::ServiceUnavailable(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.report();
        (self.status(), self.public_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
