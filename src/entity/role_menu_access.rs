//! RoleMenuAccess entity - per-menu flags of a role
//!
//! Table: role_menu_access

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role_menu_access")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub role_permission_id: i64,

    pub menu_id: i64,

    pub can_view: bool,

    pub can_add: bool,

    pub can_edit: bool,

    pub can_delete: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::role_permission::Entity",
        from = "Column::RolePermissionId",
        to = "super::role_permission::Column::Id",
        on_delete = "Cascade"
    )]
    RolePermission,
    #[sea_orm(
        belongs_to = "super::menu::Entity",
        from = "Column::MenuId",
        to = "super::menu::Column::Id",
        on_delete = "Cascade"
    )]
    Menu,
}

impl ActiveModelBehavior for ActiveModel {}
