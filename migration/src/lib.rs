//! Database migrations for campusdesk.
//!
//! Every tenant-owned table carries the same audit and soft-delete columns,
//! added through [`audit::with_audit_columns`].

pub use sea_orm_migration::prelude::*;

mod audit;
mod m2024_01_01_000001_create_tenants;
mod m2024_01_02_000001_create_branches;
mod m2024_01_02_000002_create_faculties;
mod m2024_01_02_000003_create_campus_drives;
mod m2024_01_02_000004_create_campus_drive_faculties;
mod m2024_01_02_000005_create_company_requirements;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2024_01_01_000001_create_tenants::Migration),
            Box::new(m2024_01_02_000001_create_branches::Migration),
            Box::new(m2024_01_02_000002_create_faculties::Migration),
            Box::new(m2024_01_02_000003_create_campus_drives::Migration),
            Box::new(m2024_01_02_000004_create_campus_drive_faculties::Migration),
            Box::new(m2024_01_02_000005_create_company_requirements::Migration),
        ]
    }
}
