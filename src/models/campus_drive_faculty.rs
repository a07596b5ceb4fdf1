//! Campus drive <-> faculty link rows
//!
//! Relation state only: rows are inserted and physically deleted by
//! `Repository::replace_associations`, never soft deleted.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "campus_drive_faculties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub campus_drive_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub faculty_id: Uuid,
    pub tenant_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
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
        belongs_to = "super::faculty::Entity",
        from = "Column::FacultyId",
        to = "super::faculty::Column::Id"
    )]
    Faculty,
}

impl Related<super::campus_drive::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampusDrive.def()
    }
}

impl Related<super::faculty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faculty.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
