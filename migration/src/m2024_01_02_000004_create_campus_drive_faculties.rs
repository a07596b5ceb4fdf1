//! Migration to create the campus_drive_faculties link table.
//!
//! Link rows carry no audit columns: they are relation state, replaced as a
//! set, not entities.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CampusDriveFaculties::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampusDriveFaculties::CampusDriveId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampusDriveFaculties::FacultyId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampusDriveFaculties::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampusDriveFaculties::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(CampusDriveFaculties::CampusDriveId)
                            .col(CampusDriveFaculties::FacultyId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campus_drive_faculties_campus_drive_id")
                            .from(
                                CampusDriveFaculties::Table,
                                CampusDriveFaculties::CampusDriveId,
                            )
                            .to(CampusDrives::Table, CampusDrives::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campus_drive_faculties_faculty_id")
                            .from(
                                CampusDriveFaculties::Table,
                                CampusDriveFaculties::FacultyId,
                            )
                            .to(Faculties::Table, Faculties::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CampusDriveFaculties::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CampusDriveFaculties {
    Table,
    CampusDriveId,
    FacultyId,
    TenantId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CampusDrives {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Faculties {
    Table,
    Id,
}
