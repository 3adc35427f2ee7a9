//! RoleSubMenuAccess entity - per-sub-menu flags, nested under a RoleMenuAccess
//!
//! Table: role_sub_menu_access

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role_sub_menu_access")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub role_menu_access_id: i64,

    pub sub_menu_id: i64,

    pub can_view: bool,

    pub can_add: bool,

    pub can_edit: bool,

    pub can_delete: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::role_menu_access::Entity",
        from = "Column::RoleMenuAccessId",
        to = "super::role_menu_access::Column::Id",
        on_delete = "Cascade"
    )]
    RoleMenuAccess,
    #[sea_orm(
        belongs_to = "super::sub_menu::Entity",
        from = "Column::SubMenuId",
        to = "super::sub_menu::Column::Id",
        on_delete = "Cascade"
    )]
    SubMenu,
}

impl ActiveModelBehavior for ActiveModel {}
