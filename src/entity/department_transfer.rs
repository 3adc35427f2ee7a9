//! DepartmentTransfer entity - history of employee moves
//!
//! Table: department_transfer

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "department_transfer")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub employee_id: i64,

    pub from_department_id: i64,

    pub to_department_id: i64,

    /// User who authorized the move
    pub authorized_by: i64,

    pub transfer_date: Date,

    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::EmployeeId",
        to = "super::employee::Column::Id"
    )]
    Employee,
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::FromDepartmentId",
        to = "super::department::Column::Id"
    )]
    FromDepartment,
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::ToDepartmentId",
        to = "super::department::Column::Id"
    )]
    ToDepartment,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorizedBy",
        to = "super::user::Column::Id"
    )]
    AuthorizedBy,
}

impl ActiveModelBehavior for ActiveModel {}
