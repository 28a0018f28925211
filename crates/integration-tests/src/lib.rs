//! Integration tests for Storegate.
//!
//! # Running Tests
//!
//! ```bash
//! # Router and end-to-end tests (no database needed)
//! cargo test -p storegate-integration-tests
//!
//! # Including the API flows that need PostgreSQL
//! DATABASE_URL=postgres://... cargo test -p storegate-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `pipeline` - The full router driven in-process with `tower::ServiceExt::oneshot`
//! - `server` - A real listener on an ephemeral port, exercised with `reqwest`
//! - `api` - Auth and product flows against a migrated database

use std::fs;
use std::net::SocketAddr;

use axum::Router;
use secrecy::SecretString;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use storegate_server::{
    AppState, Environment, ServerConfig, app,
    db::{self, Database},
    pipeline::PolicyConfig,
    server,
};

/// Entry document written into every test site.
pub const ENTRY_DOCUMENT: &str = "<!doctype html><html><body><div id=\"root\"></div></body></html>";

/// The frontend dev server, allowed by default.
pub const ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// A throwaway site directory: `frontend/dist` with an entry document and
/// one asset, plus an empty `public/`.
pub struct TestSite {
    dir: TempDir,
}

impl TestSite {
    /// Create the site on disk.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be written.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let dist = dir.path().join("frontend/dist");
        fs::create_dir_all(dist.join("assets")).expect("Failed to create asset dir");
        fs::create_dir_all(dir.path().join("public")).expect("Failed to create public dir");
        fs::write(dist.join("index.html"), ENTRY_DOCUMENT).expect("Failed to write entry");
        fs::write(dist.join("assets/app.js"), "console.log('storegate')")
            .expect("Failed to write asset");
        Self { dir }
    }

    /// Write a file under `public/`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_public(&self, name: &str, contents: &str) {
        fs::write(self.dir.path().join("public").join(name), contents)
            .expect("Failed to write public file");
    }

    /// A configuration rooted at this site.
    #[must_use]
    pub fn config(&self, environment: Environment) -> ServerConfig {
        ServerConfig::for_root(self.dir.path()).with_environment(environment)
    }

    /// Application state with no database connection.
    #[must_use]
    pub fn state(&self, environment: Environment) -> AppState {
        AppState::new(self.config(environment))
    }

    /// The full router, as the binary builds it minus Sentry.
    ///
    /// # Panics
    ///
    /// Panics if the default policy is rejected.
    #[must_use]
    pub fn router(&self, environment: Environment) -> Router {
        app(&self.state(environment)).expect("Failed to build router")
    }
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

/// A server listening on `127.0.0.1` on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Bind and serve `state`'s application.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start(state: &AppState) -> Self {
        let listener = server::bind(state.config().socket_addr())
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Listener has no address");
        let router = app(state).expect("Failed to build router");

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            server::serve(listener, router, shutdown)
                .await
                .expect("Test server failed");
        });

        Self {
            addr,
            client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create HTTP client"),
            shutdown: Some(tx),
            task: Some(task),
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// State connected to the database named by `DATABASE_URL`, with migrations
/// applied. `None` when the variable is unset.
///
/// # Panics
///
/// Panics if the database is configured but unreachable or migrations fail.
pub async fn database_state(site: &TestSite) -> Option<AppState> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let mut config = site.config(Environment::Development);
    config.database_url = SecretString::from(url);

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../server/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let policy = std::sync::Arc::new(PolicyConfig::storefront(config.body_limit));
    Some(AppState::with_parts(config, Database::connected(pool), policy))
}
