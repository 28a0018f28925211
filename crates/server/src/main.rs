//! Storegate server binary.
//!
//! Serves the storefront API and, in production, the built frontend on
//! port 5000. The socket is bound before the database handshake so the
//! process is reachable while `PostgreSQL` starts up.

#![cfg_attr(not(test), forbid(unsafe_code))]

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storegate_server::{AppState, ServerConfig, app, server};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let environment = config
        .sentry_environment
        .clone()
        .unwrap_or_else(|| {
            if config.environment.is_production() {
                "production".to_string()
            } else {
                "development".to_string()
            }
        });

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(environment.into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Configuration is needed before Sentry, and Sentry before tracing.
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        #[allow(clippy::print_stderr)]
        Err(e) => {
            eprintln!("storegate: {e}");
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storegate_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server stopped");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), server::ServerError> {
    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p storegate-cli -- migrate run

    let listener = server::bind(config.socket_addr()).await?;

    let state = AppState::new(config.clone());
    server::spawn_database_connect(&config, state.database().clone());

    let app = app(&state)?
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    tracing::info!(
        environment = ?config.environment,
        static_assets = config.environment.is_production(),
        "Storegate starting"
    );

    server::serve(listener, app, server::shutdown_signal()).await
}
