//! Menu entity - top level sidebar entries
//!
//! Table: menu. The `path` doubles as the permission resource name.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "menu")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(128))", unique)]
    pub path: String,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub icon: Option<String>,

    pub sort_order: i32,

    pub is_active: bool,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sub_menu::Entity")]
    SubMenu,
}

impl Related<super::sub_menu::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubMenu.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
