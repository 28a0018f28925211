//! Server lifecycle: bind, connect the database in the background, serve,
//! shut down gracefully.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use storegate_core::PolicyError;

use crate::config::ServerConfig;
use crate::db::{self, Database};

/// Pause between database connection attempts.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Bind the listening socket.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is unavailable.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Connect to the database in the background and publish the pool.
///
/// Failures are logged and retried every [`CONNECT_RETRY_INTERVAL`] up to
/// `config.db_connect_attempts` times. Giving up leaves the server running;
/// database-backed routes keep answering 503.
pub fn spawn_database_connect(config: &ServerConfig, database: Database) -> JoinHandle<bool> {
    let url = config.database_url.clone();
    let attempts = config.db_connect_attempts.max(1);

    tokio::spawn(async move {
        for attempt in 1..=attempts {
            match db::create_pool(&url).await {
                Ok(pool) => {
                    database.install(pool);
                    tracing::info!(attempt, "Database connected");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "Database connection failed");
                    if attempt < attempts {
                        tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                    }
                }
            }
        }
        tracing::error!(
            attempts,
            "Giving up on database connection; database routes will return 503"
        );
        false
    })
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the accept loop fails.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "storegate listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use secrecy::SecretString;

    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();

        let err = bind(taken).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { addr, .. } if addr == taken));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_not_fatal() {
        let mut config = ServerConfig::for_root(".");
        // Nothing listens on port 1.
        config.database_url = SecretString::from("postgres://storegate@127.0.0.1:1/storegate");
        let database = Database::pending();

        let connected = spawn_database_connect(&config, database.clone())
            .await
            .unwrap();

        assert!(!connected);
        assert!(!database.is_ready());
    }
}
