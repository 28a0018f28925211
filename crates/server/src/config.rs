//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 5000)
//! - `APP_ENV` - `production`, `development` or `test` (default: development)
//! - `NODE_ENV` - Used when `APP_ENV` is unset; only `production` selects production
//! - `STATIC_ASSET_ROOT` - Built frontend directory (default: frontend/dist)
//! - `PUBLIC_DIR` - Directory holding `sitemap.xml` and `robots.txt` (default: public)
//! - `BODY_LIMIT_BYTES` - Largest accepted request body (default: 1048576)
//! - `REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `DB_CONNECT_ATTEMPTS` - Background connection attempts before giving up (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_PORT: &str = "5000";
const DEFAULT_BODY_LIMIT: &str = "1048576";
const DEFAULT_TIMEOUT_SECS: &str = "30";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Deployment mode. Only `Production` activates static asset hosting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Whether the built frontend should be served.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Production only for exactly `production`; any other `NODE_ENV`
    /// (`staging`, `test`, unset) runs as development.
    #[must_use]
    pub fn from_node_env(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("production") => Self::Production,
            _ => Self::Development,
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" | "test" => Ok(Self::Development),
            other => Err(format!(
                "unknown environment {other:?}, expected production, development or test"
            )),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment mode
    pub environment: Environment,
    /// Built single-page frontend (entry document is `index.html`)
    pub static_asset_root: PathBuf,
    /// Location of `sitemap.xml` and `robots.txt`
    pub public_dir: PathBuf,
    /// Largest request body accepted by body ingestion
    pub body_limit: usize,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Background database connection attempts
    pub db_connect_attempts: u32,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = parse_env("HOST", "0.0.0.0")?;
        let port = parse_env("PORT", DEFAULT_PORT)?;
        let environment = match get_optional_env("APP_ENV") {
            Some(value) => parse_value("APP_ENV", &value)?,
            None => Environment::from_node_env(get_optional_env("NODE_ENV").as_deref()),
        };
        let body_limit = parse_env("BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT)?;
        let request_timeout = Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?);
        let db_connect_attempts = parse_env("DB_CONNECT_ATTEMPTS", "5")?;

        if db_connect_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "DB_CONNECT_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            environment,
            static_asset_root: PathBuf::from(get_env_or_default("STATIC_ASSET_ROOT", "frontend/dist")),
            public_dir: PathBuf::from(get_env_or_default("PUBLIC_DIR", "public")),
            body_limit,
            request_timeout,
            db_connect_attempts,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// A development configuration rooted at `root`, for tests and tooling.
    #[must_use]
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            database_url: SecretString::from("postgres://localhost/storegate"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            environment: Environment::Development,
            static_asset_root: root.join("frontend/dist"),
            public_dir: root.join("public"),
            body_limit: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            db_connect_attempts: 1,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Switch the deployment mode.
    #[must_use]
    pub const fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Path of the single-page application entry document.
    #[must_use]
    pub fn entry_document(&self) -> PathBuf {
        self.static_asset_root.join("index.html")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
