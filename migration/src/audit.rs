//! Shared column set for tenant-owned tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub enum Audit {
    TenantId,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
    DeletedAt,
    DeletedBy,
}

#[derive(DeriveIden)]
pub enum Tenants {
    Table,
    Id,
}

/// Adds `tenant_id` (with a cascading foreign key to `tenants`), the audit
/// timestamps/actors and the soft-delete marker columns to `table`.
pub fn with_audit_columns<'a>(
    table: &'a mut TableCreateStatement,
    table_name: &str,
) -> &'a mut TableCreateStatement {
    table
        .col(ColumnDef::new(Audit::TenantId).uuid().not_null())
        .col(
            ColumnDef::new(Audit::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Audit::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(ColumnDef::new(Audit::CreatedBy).uuid().null())
        .col(ColumnDef::new(Audit::UpdatedBy).uuid().null())
        .col(
            ColumnDef::new(Audit::DeletedAt)
                .timestamp_with_time_zone()
                .null(),
        )
        .col(ColumnDef::new(Audit::DeletedBy).uuid().null())
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{table_name}_tenant_id"))
                .from(Alias::new(table_name), Audit::TenantId)
                .to(Tenants::Table, Tenants::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
}

/// Index on `(tenant_id, deleted_at)`, the predicate every scoped read uses.
pub fn tenant_scope_index(table_name: &str) -> IndexCreateStatement {
    Index::create()
        .name(format!("idx_{table_name}_tenant_scope"))
        .table(Alias::new(table_name))
        .col(Audit::TenantId)
        .col(Audit::DeletedAt)
        .to_owned()
}
