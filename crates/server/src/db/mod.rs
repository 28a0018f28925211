//! Database access for the Auth and Product collaborators.
//!
//! # Tables
//!
//! - `users` - Accounts (name, normalized email, argon2 password hash)
//! - `sessions` - Opaque session tokens with expiry
//! - `products` - Catalog entries (name, price, image URL)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p storegate-cli -- migrate run
//! ```
//!
//! # Connection lifecycle
//!
//! The server binds its socket before the database handshake completes, so
//! handlers read the pool through [`Database`], a set-once handle that
//! reports [`AppError::ServiceUnavailable`] until the connect task fills it.

pub mod products;
pub mod users;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::AppError;

pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Set-once handle to the connection pool, shared by every handler.
///
/// Cloning is cheap. Reads never block: before [`Database::install`] is
/// called, [`Database::pool`] fails with `ServiceUnavailable`.
#[derive(Clone, Default)]
pub struct Database {
    pool: Arc<OnceLock<PgPool>>,
}

impl Database {
    /// A handle with no connection yet.
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// A handle that is already connected.
    #[must_use]
    pub fn connected(pool: PgPool) -> Self {
        let db = Self::default();
        db.install(pool);
        db
    }

    /// Publish the pool. Only the first call has an effect.
    pub fn install(&self, pool: PgPool) {
        if self.pool.set(pool).is_err() {
            tracing::warn!("Database pool already installed; ignoring second connection");
        }
    }

    /// Whether the connection has been established.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.pool.get().is_some()
    }

    /// The pool, or `ServiceUnavailable` while connecting.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ServiceUnavailable`] before the pool is installed.
    pub fn pool(&self) -> Result<&PgPool, AppError> {
        self.pool
            .get()
            .ok_or(AppError::ServiceUnavailable("database"))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("ready", &self.is_ready())
            .finish()
    }
}
