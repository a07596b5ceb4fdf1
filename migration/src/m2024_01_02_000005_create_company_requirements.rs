//! Migration to create the company_requirements table (has-many children of
//! a campus drive, optionally targeting a branch).

use sea_orm_migration::prelude::*;

use crate::audit::{tenant_scope_index, with_audit_columns};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(CompanyRequirements::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(CompanyRequirements::Id)
                    .uuid()
                    .not_null()
                    .primary_key(),
            )
            .col(
                ColumnDef::new(CompanyRequirements::CampusDriveId)
                    .uuid()
                    .not_null(),
            )
            .col(ColumnDef::new(CompanyRequirements::BranchId).uuid().null())
            .col(
                ColumnDef::new(CompanyRequirements::CompanyName)
                    .text()
                    .not_null(),
            )
            .col(
                ColumnDef::new(CompanyRequirements::Vacancy)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_company_requirements_campus_drive_id")
                    .from(
                        CompanyRequirements::Table,
                        CompanyRequirements::CampusDriveId,
                    )
                    .to(CampusDrives::Table, CampusDrives::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_company_requirements_branch_id")
                    .from(CompanyRequirements::Table, CompanyRequirements::BranchId)
                    .to(Branches::Table, Branches::Id)
                    .on_delete(ForeignKeyAction::SetNull),
            );
        with_audit_columns(&mut table, "company_requirements");

        manager.create_table(table.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_company_requirements_campus_drive_id")
                    .table(CompanyRequirements::Table)
                    .col(CompanyRequirements::CampusDriveId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(tenant_scope_index("company_requirements"))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CompanyRequirements::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CompanyRequirements {
    Table,
    Id,
    CampusDriveId,
    BranchId,
    CompanyName,
    Vacancy,
}

#[derive(DeriveIden)]
enum CampusDrives {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Branches {
    Table,
    Id,
}
