//! # Entity Contracts
//!
//! Marker traits naming the columns the generic repository scopes and stamps.
//! An entity opts into tenant scoping, soft deletion and auditing by
//! implementing them; nothing is discovered by reflection.

use sea_orm::EntityTrait;
use uuid::Uuid;

/// Entity with a UUID identifier and audit timestamps/actors.
pub trait Auditable: EntityTrait {
    /// Primary key column (a UUID)
    fn id_column() -> Self::Column;
    fn created_at_column() -> Self::Column;
    fn updated_at_column() -> Self::Column;
    fn created_by_column() -> Self::Column;
    fn updated_by_column() -> Self::Column;
}

/// Entity whose rows are logically removed by stamping `deleted_at`.
///
/// Every repository read and write excludes rows with a non-null marker
/// unless the caller passes `QueryProcessor::IncludeDeleted`.
pub trait SoftDeletable: EntityTrait {
    fn deleted_at_column() -> Self::Column;
    fn deleted_by_column() -> Self::Column;
    fn is_deleted(model: &Self::Model) -> bool;
}

/// Entity owned by exactly one tenant.
pub trait TenantScoped: EntityTrait {
    fn tenant_column() -> Self::Column;
    fn tenant_id(model: &Self::Model) -> Uuid;
}

/// Everything the tenant-scoped repository operations require.
pub trait Record: Auditable + SoftDeletable + TenantScoped {}

impl<E> Record for E where E: Auditable + SoftDeletable + TenantScoped {}
