//! Company requirement entity model
//!
//! Has-many children of a campus drive: one row per recruiting company, with
//! the number of vacancies and an optional target branch.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::repositories::record::{Auditable, SoftDeletable, TenantScoped};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "company_requirements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Parent campus drive
    pub campus_drive_id: Uuid,

    /// Branch the company recruits from (optional)
    pub branch_id: Option<Uuid>,

    pub company_name: String,

    /// Open positions offered at the drive
    pub vacancy: i32,

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
    #[sea_orm(
        belongs_to = "super::campus_drive::Entity",
        from = "Column::CampusDriveId",
        to = "super::campus_drive::Column::Id"
    )]
    CampusDrive,
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
}

impl Related<super::campus_drive::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampusDrive.def()
    }
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
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
