//! AuditLog entity - append-only operation log
//!
//! Table: audit_log

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    LoginFailed,
    Transfer,
    StatusChange,
    PermissionReplace,
    PasswordChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Login => "LOGIN",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::Transfer => "TRANSFER",
            AuditAction::StatusChange => "STATUS_CHANGE",
            AuditAction::PermissionReplace => "PERMISSION_REPLACE",
            AuditAction::PasswordChange => "PASSWORD_CHANGE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Acting user, None for anonymous attempts
    #[sea_orm(nullable)]
    pub user_id: Option<i64>,

    #[sea_orm(column_type = "String(Some(128))")]
    pub username: String,

    /// `AuditAction::as_str`
    #[sea_orm(column_type = "String(Some(32))")]
    pub action: String,

    #[sea_orm(column_type = "String(Some(64))")]
    pub table_name: String,

    #[sea_orm(nullable)]
    pub record_id: Option<i64>,

    /// Row state before the change (JSON)
    #[sea_orm(column_type = "Text", nullable)]
    pub old_values: Option<String>,

    /// Row state after the change (JSON)
    #[sea_orm(column_type = "Text", nullable)]
    pub new_values: Option<String>,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub ip: Option<String>,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
