//! Campus drive entity model
//!
//! A recruitment event held at a campus. Each drive carries a generated
//! per-tenant `code` and the student registration link derived from it.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::repositories::record::{Auditable, SoftDeletable, TenantScoped};

/// Campus drive owned by a tenant
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "campus_drives")]
pub struct Model {
    /// Unique identifier for the drive (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Generated code, unique per tenant (including soft-deleted drives)
    pub code: String,

    /// Campus hosting the drive; unique among a tenant's live drives
    pub campus_name: String,

    pub location: Option<String>,

    /// Scheduled date of the drive (optional)
    pub drive_date: Option<DateTimeWithTimeZone>,

    /// Registration link handed to students, built from `code`
    pub student_registration_link: String,

    pub tenant_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub deleted_at: Option<DateTimeWithTimeZone>,
    pub deleted_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::company_requirement::Entity")]
    CompanyRequirements,
    #[sea_orm(has_many = "super::campus_drive_faculty::Entity")]
    CampusDriveFaculties,
}

impl Related<super::company_requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompanyRequirements.def()
    }
}

impl Related<super::campus_drive_faculty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampusDriveFaculties.def()
    }
}

impl Related<super::faculty::Entity> for Entity {
    fn to() -> RelationDef {
        super::campus_drive_faculty::Relation::Faculty.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::campus_drive_faculty::Relation::CampusDrive.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Auditable for Entity {
    fn id_column() -> Column {
        Column::Id
    }
    fn created_at_column() -> Column {
        Column::CreatedAt
    }
    fn updated_at_column() -> Column {
        Column::UpdatedAt
    }
    fn created_by_column() -> Column {
        Column::CreatedBy
    }
    fn updated_by_column() -> Column {
        Column::UpdatedBy
    }
}

impl SoftDeletable for Entity {
    fn deleted_at_column() -> Column {
        Column::DeletedAt
    }
    fn deleted_by_column() -> Column {
        Column::DeletedBy
    }
    fn is_deleted(model: &Model) -> bool {
        model.deleted_at.is_some()
    }
}

impl TenantScoped for Entity {
    fn tenant_column() -> Column {
        Column::TenantId
    }
    fn tenant_id(model: &Model) -> Uuid {
        model.tenant_id
    }
}
