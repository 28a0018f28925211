//! Liveness and readiness probes.

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

/// Paths owned by this router.
pub const PATHS: &[&str] = &["/health", "/health/ready"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// 503 until the background connect task has installed the pool, and
/// whenever the database stops answering.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let Ok(pool) = state.database().pool() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "connecting");
    };

    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}
