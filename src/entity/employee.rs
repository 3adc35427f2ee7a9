//! Employee entity
//!
//! Table: employee

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employee")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Staff number (unique), printed on the card
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub employee_code: String,

    #[sea_orm(column_type = "String(Some(128))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub designation: Option<String>,

    pub department_id: i64,

    /// Staff category (officer, staff, worker, ...)
    #[sea_orm(column_type = "String(Some(32))", nullable)]
    pub category: Option<String>,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub section: Option<String>,

    #[sea_orm(column_type = "String(Some(20))", nullable)]
    pub phone: Option<String>,

    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "String(Some(8))", nullable)]
    pub blood_group: Option<String>,

    /// Photo path relative to the upload directory
    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub photo: Option<String>,

    #[sea_orm(nullable)]
    pub join_date: Option<Date>,

    pub is_active: bool,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id"
    )]
    Department,
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
