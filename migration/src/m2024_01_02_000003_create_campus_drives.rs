//! Migration to create the campus_drives table.
//!
//! `(tenant_id, code)` is unique; it is the final authority when two
//! concurrent inserts draw the same generated code.

use sea_orm_migration::prelude::*;

use crate::audit::{Audit, tenant_scope_index, with_audit_columns};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(CampusDrives::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(CampusDrives::Id)
                    .uuid()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(CampusDrives::Code).text().not_null())
            .col(ColumnDef::new(CampusDrives::CampusName).text().not_null())
            .col(ColumnDef::new(CampusDrives::Location).text().null())
            .col(
                ColumnDef::new(CampusDrives::DriveDate)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(
                ColumnDef::new(CampusDrives::StudentRegistrationLink)
                    .text()
                    .not_null(),
            );
        with_audit_columns(&mut table, "campus_drives");

        manager.create_table(table.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campus_drives_tenant_code")
                    .table(CampusDrives::Table)
                    .col(Audit::TenantId)
                    .col(CampusDrives::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(tenant_scope_index("campus_drives"))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CampusDrives::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CampusDrives {
    Table,
    Id,
    Code,
    CampusName,
    Location,
    DriveDate,
    StudentRegistrationLink,
}
