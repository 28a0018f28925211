//! Storegate CLI - database migrations.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! storegate-cli migrate run
//!
//! # Show applied and pending migrations
//! storegate-cli migrate status
//! ```
//!
//! Both commands read `DATABASE_URL` from the environment (or `.env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "storegate-cli")]
#[command(author, version, about = "Storegate CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply every pending migration
    Run,
    /// List migrations and whether each has been applied
    Status,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::migrate::MigrationError> {
    match cli.command {
        Commands::Migrate { action } => match action {
            MigrateAction::Run => commands::migrate::run().await,
            MigrateAction::Status => commands::migrate::status().await,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_migrate_run() {
        let cli = Cli::try_parse_from(["storegate-cli", "migrate", "run"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Migrate {
                action: MigrateAction::Run
            }
        ));
    }

    #[test]
    fn test_migrate_requires_action() {
        assert!(Cli::try_parse_from(["storegate-cli", "migrate"]).is_err());
    }
}
