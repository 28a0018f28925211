//! JSON response envelope shared by the API routes.
//!
//! Success: `{"success": true, "data": ...}`
//! Failure: `{"success": false, "message": "..."}`

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::services::AuthError;

/// A successful API payload.
#[derive(Debug)]
pub struct Envelope<T> {
    status: StatusCode,
    data: T,
}

impl<T: Serialize> Envelope<T> {
    /// `200 OK` with `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    /// `201 Created` with `data`.
    pub const fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": true, "data": self.data })),
        )
            .into_response()
    }
}

/// An [`AppError`] rendered as a JSON envelope.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.report();
        (
            self.0.status(),
            Json(json!({ "success": false, "message": self.0.public_message() })),
        )
            .into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        Self(AppError::Database(err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
