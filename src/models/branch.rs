//! Branch entity model
//!
//! Academic branches (e.g. "Computer Science") a company requirement can
//! target.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::repositories::record::{Auditable, SoftDeletable, TenantScoped};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "branches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
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
}

impl Related<super::company_requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompanyRequirements.def()
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
