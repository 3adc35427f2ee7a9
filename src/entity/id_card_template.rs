//! IdCardTemplate entity - card backgrounds plus a JSON layout
//!
//! Table: id_card_template

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "id_card_template")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// Design width in pixels; layout coordinates are relative to it
    pub width: i32,

    /// Design height in pixels
    pub height: i32,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub front_image: Option<String>,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub back_image: Option<String>,

    /// Serialized `card::CardLayout`
    #[sea_orm(column_type = "Text")]
    pub layout: String,

    pub is_active: bool,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
