//! Business logic behind the API routes.

pub mod auth;

pub use auth::{AuthError, AuthService};
