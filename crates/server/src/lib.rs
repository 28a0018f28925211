//! Storegate server library.
//!
//! The HTTP entry point of the storefront: an explicit ingress pipeline
//! (security headers, hidden-path denial, CORS, body parsing) in front of the
//! auth and product APIs, with static hosting of the built frontend in
//! production. Exposed as a library so the binary, router tests, and the
//! integration-test crate share one assembly path.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
pub mod static_files;

pub use app::{app, app_with_mounts};
pub use config::{ConfigError, Environment, ServerConfig};
pub use error::AppError;
pub use state::AppState;
