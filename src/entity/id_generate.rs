//! IdGenerate entity - one issued card and its lifecycle
//!
//! Table: id_generate

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Card lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Created,
    ReadyToPrint,
    Printed,
    Cancelled,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Created => "created",
            CardStatus::ReadyToPrint => "ready_to_print",
            CardStatus::Printed => "printed",
            CardStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a card in `self` may move to `next`.
    /// `Printed -> Printed` is a reprint.
    pub fn can_transition_to(&self, next: CardStatus) -> bool {
        use CardStatus::*;
        matches!(
            (self, next),
            (Created, ReadyToPrint)
                | (ReadyToPrint, Printed)
                | (ReadyToPrint, Created)
                | (Printed, Printed)
                | (Created, Cancelled)
                | (ReadyToPrint, Cancelled)
        )
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(CardStatus::Created),
            "ready_to_print" => Ok(CardStatus::ReadyToPrint),
            "printed" => Ok(CardStatus::Printed),
            "cancelled" => Ok(CardStatus::Cancelled),
            other => Err(format!("unknown card status '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "id_generate")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub employee_id: i64,

    pub template_id: i64,

    /// One of `CardStatus`
    #[sea_orm(column_type = "String(Some(16))")]
    pub status: String,

    /// Opaque token encoded in the printed QR code
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub qr_code: String,

    pub issue_date: Date,

    pub expiry_date: Date,

    #[sea_orm(nullable)]
    pub printed_at: Option<i64>,

    pub print_count: i32,

    #[sea_orm(nullable)]
    pub created_by: Option<i64>,

    pub created_at: i64,

    pub updated_at: i64,
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
        belongs_to = "super::id_card_template::Entity",
        from = "Column::TemplateId",
        to = "super::id_card_template::Column::Id"
    )]
    Template,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parsed status; unknown values read as `Created`
    pub fn card_status(&self) -> CardStatus {
        self.status.parse().unwrap_or(CardStatus::Created)
    }
}
