//! Database migration commands.
//!
//! Migrations live in `crates/server/migrations/` and are embedded at
//! compile time.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use std::collections::HashSet;

use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::migrate::{Migrate, MigrateError, Migrator};

use storegate_server::db;

static MIGRATOR: Migrator = sqlx::migrate!("../server/migrations");

/// Errors from migration commands.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),
}

async fn connect() -> Result<PgPool, MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Apply every pending migration.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset, the database is unreachable,
/// or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!(count = MIGRATOR.iter().count(), "Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}

/// Print each known migration and whether it has been applied.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset or the database is unreachable.
pub async fn status() -> Result<(), MigrationError> {
    let pool = connect().await?;
    let mut conn = pool.acquire().await?;

    conn.ensure_migrations_table().await?;
    let applied: HashSet<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();

    #[allow(clippy::print_stdout)]
    {
        for migration in MIGRATOR.iter() {
            let state = if applied.contains(&migration.version) {
                "applied"
            } else {
                "pending"
            };
            println!("{:>16}  {state:<8} {}", migration.version, migration.description);
        }
    }

    Ok(())
}
