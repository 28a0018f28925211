//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Database;
use crate::pipeline::PolicyConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The database handle starts empty and is
/// filled by the background connect task.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    database: Database,
    policy: Arc<PolicyConfig>,
}

impl AppState {
    /// State with the storefront policy and a not-yet-connected database.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let policy = Arc::new(PolicyConfig::storefront(config.body_limit));
        Self::with_parts(config, Database::pending(), policy)
    }

    /// State from explicit parts.
    #[must_use]
    pub fn with_parts(config: ServerConfig, database: Database, policy: Arc<PolicyConfig>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                database,
                policy,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.inner.database
    }

    /// The shared ingress policy.
    #[must_use]
    pub fn policy(&self) -> &Arc<PolicyConfig> {
        &self.inner.policy
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.inner.config.environment)
            .field("database", &self.inner.database)
            .finish_non_exhaustive()
    }
}
