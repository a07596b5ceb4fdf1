//! # campusdesk CLI
//!
//! Operational entry point: migrations and a connectivity check.

use anyhow::{Context, Result};
use campusdesk::{
    config::ConfigLoader,
    db,
    migration::{Migrator, MigratorTrait},
    telemetry::{self, TraceContext},
};
use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;

#[derive(Debug, Parser)]
#[command(name = "campusdesk", version, about = "campusdesk database tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply, revert or inspect schema migrations
    Migrate {
        #[command(subcommand)]
        action: Option<MigrateAction>,
    },
    /// Open the pool and run a health probe
    Check,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations (default)
    Up,
    /// Revert the most recent migration
    Down,
    /// List applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;
    telemetry::describe_metrics();

    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, profile = %config.profile, "Configuration loaded");
    }

    let pool = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    telemetry::with_trace_context(TraceContext::generate(), run(cli.command, &pool)).await
}

async fn run(command: Command, pool: &DatabaseConnection) -> Result<()> {
    tracing::debug!(trace_id = telemetry::current_trace_id().as_deref(), "Running command");
    match command {
        Command::Migrate { action } => match action.unwrap_or(MigrateAction::Up) {
            MigrateAction::Up => {
                db::run_migrations(pool)
                    .await
                    .context("applying migrations")?;
                tracing::info!("Migrations applied");
            }
            MigrateAction::Down => {
                Migrator::down(pool, Some(1))
                    .await
                    .context("reverting last migration")?;
                tracing::info!("Last migration reverted");
            }
            MigrateAction::Status => {
                let applied = Migrator::get_applied_migrations(pool)
                    .await
                    .context("reading applied migrations")?;
                let pending = Migrator::get_pending_migrations(pool)
                    .await
                    .context("reading pending migrations")?;
                for migration in &applied {
                    println!("applied  {}", migration.name());
                }
                for migration in &pending {
                    println!("pending  {}", migration.name());
                }
            }
        },
        Command::Check => {
            db::health_check(pool).await.context("health check")?;
            println!("database ok");
        }
    }

    Ok(())
}
