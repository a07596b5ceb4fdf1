//! Migration to create the faculties table.

use sea_orm_migration::prelude::*;

use crate::audit::{tenant_scope_index, with_audit_columns};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(Faculties::Table)
            .if_not_exists()
            .col(ColumnDef::new(Faculties::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Faculties::Name).text().not_null())
            .col(ColumnDef::new(Faculties::Email).text().null());
        with_audit_columns(&mut table, "faculties");

        manager.create_table(table.to_owned()).await?;
        manager
            .create_index(tenant_scope_index("faculties"))
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Faculties::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Faculties {
    Table,
    Id,
    Name,
    Email,
}
