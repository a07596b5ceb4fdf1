//! Migration to create the branches table (academic branches a company
//! requirement can target).

use sea_orm_migration::prelude::*;

use crate::audit::{tenant_scope_index, with_audit_columns};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Branches::Table)
            .if_not_exists()
            .col(ColumnDef::new(Branches::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Branches::Name).text().not_null());
        with_audit_columns(&mut table, "branches");

        manager.create_table(table.to_owned()).await?;
        manager
            .create_index(tenant_scope_index("branches"))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Branches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Branches {
    Table,
    Id,
    Name,
}
