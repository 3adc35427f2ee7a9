//! Department entity
//!
//! Table: department

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "department")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Department name (unique)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// Short code printed on cards, e.g. "HR"
    #[sea_orm(column_type = "String(Some(16))", unique, nullable)]
    pub code: Option<String>,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub description: Option<String>,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
