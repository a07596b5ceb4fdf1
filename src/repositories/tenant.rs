//! # Tenant Repository
//!
//! The tenant registry every scoped table references. Works over the pool or
//! through a [`UnitOfWork`](super::UnitOfWork), since both are connections.

use crate::error::RepositoryError;
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Column as TenantColumn, Entity as Tenant,
    Model as TenantModel,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryOrder,
    Set,
};
use uuid::Uuid;

/// Request data for creating a new tenant
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    /// Display name for the tenant
    pub name: String,
}

/// Repository for Tenant database operations
pub struct TenantRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TenantRepository<'a, C> {
    /// Create a new TenantRepository over the given connection
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Create a new tenant
    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
    ) -> Result<TenantModel, RepositoryError> {
        let name = validate_tenant_name(&request.name)?;

        let now = Utc::now();
        let tenant = TenantActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let result = tenant
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        tracing::info!(tenant_id = %result.id, "Tenant created");
        Ok(result)
    }

    /// Get tenant by ID
    pub async fn get_tenant_by_id(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find_by_id(tenant_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// List all tenants by name
    pub async fn list_tenants(&self) -> Result<Vec<TenantModel>, RepositoryError> {
        Tenant::find()
            .order_by_asc(TenantColumn::Name)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Update tenant name
    pub async fn update_tenant_name(
        &self,
        tenant_id: Uuid,
        name: String,
    ) -> Result<TenantModel, RepositoryError> {
        let name = validate_tenant_name(&name)?;

        let tenant = self
            .get_tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Tenant not found".to_string()))?;

        let mut active_tenant = tenant.into_active_model();
        active_tenant.name = Set(name);
        active_tenant.updated_at = Set(Utc::now().into());

        active_tenant
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Check if a tenant exists
    pub async fn tenant_exists(&self, tenant_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.get_tenant_by_id(tenant_id).await?.is_some())
    }

    /// Get tenant count
    pub async fn get_tenant_count(&self) -> Result<u64, RepositoryError> {
        Tenant::find()
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

/// Trimmed tenant name, or a validation error.
fn validate_tenant_name(name: &str) -> Result<String, RepositoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RepositoryError::validation_error(
            "Tenant name cannot be empty",
        ));
    }

    if name.len() > 255 {
        return Err(RepositoryError::validation_error(
            "Tenant name cannot exceed 255 characters",
        ));
    }

    // letters, numbers, spaces, hyphens, underscores
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '_')
    {
        return Err(RepositoryError::validation_error(
            "Tenant name can only contain letters, numbers, spaces, hyphens, and underscores",
        ));
    }

    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::{init_pool, run_migrations};
    use sea_orm::DatabaseConnection;

    async fn setup_test_db() -> DatabaseConnection {
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            ..Default::default()
        };

        let db = init_pool(&config).await.expect("Failed to init test DB");
        run_migrations(&db).await.expect("Failed to migrate test DB");
        db
    }

    #[test]
    fn test_tenant_name_rules() {
        assert_eq!(validate_tenant_name("  Acme  ").unwrap(), "Acme");
        assert!(validate_tenant_name("").is_err());
        assert!(validate_tenant_name("   ").is_err());
        assert!(validate_tenant_name(&"a".repeat(256)).is_err());
        assert!(validate_tenant_name("Test@Tenant").is_err());
        assert!(validate_tenant_name("North-Campus_2").is_ok());
    }

    #[tokio::test]
    async fn test_create_and_get_tenant() {
        let db = setup_test_db().await;
        let repo = TenantRepository::new(&db);

        let created = repo
            .create_tenant(CreateTenantRequest {
                name: "Test Tenant".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.name, "Test Tenant");
        assert!(created.created_at.timestamp() > 0);

        let found = repo.get_tenant_by_id(created.id).await.unwrap();
        assert_eq!(found.map(|t| t.id), Some(created.id));
        assert!(repo.get_tenant_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_tenant_name_is_constraint_violation() {
        let db = setup_test_db().await;
        let repo = TenantRepository::new(&db);

        let request = CreateTenantRequest {
            name: "Acme".to_string(),
        };
        repo.create_tenant(request.clone()).await.unwrap();

        let err = repo.create_tenant(request).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_update_tenant_name() {
        let db = setup_test_db().await;
        let repo = TenantRepository::new(&db);

        let created = repo
            .create_tenant(CreateTenantRequest {
                name: "Original Name".to_string(),
            })
            .await
            .unwrap();

        let tenant = repo
            .update_tenant_name(created.id, "Updated Name".to_string())
            .await
            .unwrap();
        assert_eq!(tenant.name, "Updated Name");
        assert_eq!(tenant.id, created.id);

        let missing = repo
            .update_tenant_name(Uuid::new_v4(), "Whatever".to_string())
            .await
            .unwrap_err();
        assert!(matches!(missing, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_exists_count_and_list() {
        let db = setup_test_db().await;
        let repo = TenantRepository::new(&db);

        assert_eq!(repo.get_tenant_count().await.unwrap(), 0);
        assert!(!repo.tenant_exists(Uuid::new_v4()).await.unwrap());

        for name in ["Beta", "Alpha"] {
            repo.create_tenant(CreateTenantRequest {
                name: name.to_string(),
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.get_tenant_count().await.unwrap(), 2);
        let names: Vec<String> = repo
            .list_tenants()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }
}
