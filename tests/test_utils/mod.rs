//! Test utilities for database testing.
//!
//! In-memory SQLite with every migration applied, plus fixture helpers that
//! go through the repository so audit columns are stamped the normal way.

use anyhow::Result;
use campusdesk::config::AppConfig;
use campusdesk::models::{Branch, Faculty, branch, faculty};
use campusdesk::repositories::{CreateTenantRequest, Repository, TenantRepository};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, Set};
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// The pool holds exactly one connection: each SQLite memory connection is
/// its own database. Tests therefore keep at most one write unit of work
/// open at a time.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Configuration the service tests run with.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        registration_base_url: "https://campus.example.edu/register".to_string(),
        ..Default::default()
    }
}

/// Creates a tenant and returns its id.
#[allow(dead_code)]
pub async fn create_test_tenant(db: &DatabaseConnection, name: &str) -> Result<Uuid> {
    let tenant = TenantRepository::new(db)
        .create_tenant(CreateTenantRequest {
            name: name.to_string(),
        })
        .await?;
    Ok(tenant.id)
}

/// Inserts a faculty member for `tenant` in its own unit of work.
#[allow(dead_code)]
pub async fn create_faculty(repo: &Repository, tenant: Uuid, name: &str) -> Result<faculty::Model> {
    let uow = repo.begin().await?;
    let result = repo
        .add::<Faculty>(
            &uow,
            faculty::ActiveModel {
                name: Set(name.to_string()),
                email: Set(None),
                tenant_id: Set(tenant),
                ..Default::default()
            },
        )
        .await;
    Ok(uow.finish(result).await?)
}

/// Inserts a branch for `tenant` in its own unit of work.
#[allow(dead_code)]
pub async fn create_branch(repo: &Repository, tenant: Uuid, name: &str) -> Result<branch::Model> {
    let uow = repo.begin().await?;
    let result = repo
        .add::<Branch>(
            &uow,
            branch::ActiveModel {
                name: Set(name.to_string()),
                tenant_id: Set(tenant),
                ..Default::default()
            },
        )
        .await;
    Ok(uow.finish(result).await?)
}
