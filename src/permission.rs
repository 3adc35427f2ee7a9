//! Role based menu permissions
//!
//! A role's access tree is `role_permission -> role_menu_access -> role_sub_menu_access`.
//! Every protected API area is named by the `path` of the menu or sub-menu that
//! shows it in the dashboard sidebar.

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::entity::{menu, role, role_menu_access, role_permission, role_sub_menu_access, sub_menu};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;

/// Resource constants (menu / sub-menu paths)
pub mod resource {
    pub const DASHBOARD: &str = "/dashboard";
    pub const USERS: &str = "/users";
    pub const ROLES: &str = "/roles";
    pub const MENUS: &str = "/menus";
    pub const AUDIT_LOGS: &str = "/audit-logs";
    pub const DEPARTMENTS: &str = "/departments";
    pub const EMPLOYEES: &str = "/employees";
    pub const DEPARTMENT_TRANSFERS: &str = "/department-transfers";
    pub const ID_CARD_TEMPLATES: &str = "/id-card-templates";
    pub const ID_CARDS: &str = "/id-cards";
}

/// Action constants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Add,
    Edit,
    Delete,
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "view" => Ok(Action::View),
            "add" => Ok(Action::Add),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            other => Err(AppError::Validation(format!("unknown action '{}'", other))),
        }
    }
}

/// The four flags stored on both access tables
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessFlags {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_add: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl AccessFlags {
    pub const ALL: AccessFlags = AccessFlags {
        can_view: true,
        can_add: true,
        can_edit: true,
        can_delete: true,
    };

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Add => self.can_add,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
        }
    }
}

impl From<&role_menu_access::Model> for AccessFlags {
    fn from(m: &role_menu_access::Model) -> Self {
        Self {
            can_view: m.can_view,
            can_add: m.can_add,
            can_edit: m.can_edit,
            can_delete: m.can_delete,
        }
    }
}

impl From<&role_sub_menu_access::Model> for AccessFlags {
    fn from(m: &role_sub_menu_access::Model) -> Self {
        Self {
            can_view: m.can_view,
            can_add: m.can_add,
            can_edit: m.can_edit,
            can_delete: m.can_delete,
        }
    }
}

/// Check whether `role_id` may perform `action` on `resource`
pub async fn check(
    db: &DatabaseConnection,
    role_id: i64,
    resource: &str,
    action: Action,
) -> Result<bool, DbErr> {
    let Some(role_model) = role::Entity::find_by_id(role_id).one(db).await? else {
        return Ok(false);
    };
    if role_model.is_admin() {
        return Ok(true);
    }

    let Some(root) = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(role_id))
        .one(db)
        .await?
    else {
        return Ok(false);
    };

    // Sub-menu paths take precedence over menu paths
    if let Some(sub) = sub_menu::Entity::find()
        .filter(sub_menu::Column::Path.eq(resource))
        .one(db)
        .await?
    {
        let Some(menu_access) = find_menu_access(db, root.id, sub.menu_id).await? else {
            return Ok(false);
        };
        let sub_access = role_sub_menu_access::Entity::find()
            .filter(role_sub_menu_access::Column::RoleMenuAccessId.eq(menu_access.id))
            .filter(role_sub_menu_access::Column::SubMenuId.eq(sub.id))
            .one(db)
            .await?;
        return Ok(sub_access
            .map(|a| AccessFlags::from(&a).allows(action))
            .unwrap_or(false));
    }

    if let Some(menu_model) = menu::Entity::find()
        .filter(menu::Column::Path.eq(resource))
        .one(db)
        .await?
    {
        let access = find_menu_access(db, root.id, menu_model.id).await?;
        return Ok(access
            .map(|a| AccessFlags::from(&a).allows(action))
            .unwrap_or(false));
    }

    Ok(false)
}

async fn find_menu_access(
    db: &DatabaseConnection,
    role_permission_id: i64,
    menu_id: i64,
) -> Result<Option<role_menu_access::Model>, DbErr> {
    role_menu_access::Entity::find()
        .filter(role_menu_access::Column::RolePermissionId.eq(role_permission_id))
        .filter(role_menu_access::Column::MenuId.eq(menu_id))
        .one(db)
        .await
}

/// Stored flags of one role, keyed by menu id and sub-menu id
#[derive(Debug, Default)]
pub struct RoleAccess {
    pub menus: HashMap<i64, AccessFlags>,
    pub sub_menus: HashMap<i64, AccessFlags>,
}

/// Load every access row under a role's `role_permission`
pub async fn load_role_access(db: &DatabaseConnection, role_id: i64) -> Result<RoleAccess, DbErr> {
    let mut access = RoleAccess::default();

    let Some(root) = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(role_id))
        .one(db)
        .await?
    else {
        return Ok(access);
    };

    let menu_rows = role_menu_access::Entity::find()
        .filter(role_menu_access::Column::RolePermissionId.eq(root.id))
        .all(db)
        .await?;
    let access_ids: Vec<i64> = menu_rows.iter().map(|r| r.id).collect();
    for row in &menu_rows {
        access.menus.insert(row.menu_id, AccessFlags::from(row));
    }

    let sub_rows = role_sub_menu_access::Entity::find()
        .filter(role_sub_menu_access::Column::RoleMenuAccessId.is_in(access_ids))
        .all(db)
        .await?;
    for row in &sub_rows {
        access.sub_menus.insert(row.sub_menu_id, AccessFlags::from(row));
    }

    Ok(access)
}

/// Fail with 403 unless the current user may perform `action` on `resource`
pub async fn require(
    db: &DatabaseConnection,
    user: &CurrentUser,
    resource: &str,
    action: Action,
) -> AppResult<()> {
    if user.is_admin() || check(db, user.role_id, resource, action).await? {
        return Ok(());
    }
    tracing::warn!(
        "Permission denied: user={} resource={} action={:?}",
        user.email,
        resource,
        action
    );
    Err(AppError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_allow() {
        let flags = AccessFlags {
            can_view: true,
            can_edit: true,
            ..Default::default()
        };
        assert!(flags.allows(Action::View));
        assert!(flags.allows(Action::Edit));
        assert!(!flags.allows(Action::Add));
        assert!(!flags.allows(Action::Delete));
        assert!(AccessFlags::ALL.allows(Action::Delete));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("VIEW".parse::<Action>().unwrap(), Action::View);
        assert_eq!("delete".parse::<Action>().unwrap(), Action::Delete);
        assert!("print".parse::<Action>().is_err());
    }

    #[test]
    fn test_flags_from_sub_menu_access() {
        let row = role_sub_menu_access::Model {
            id: 1,
            role_menu_access_id: 1,
            sub_menu_id: 4,
            can_view: true,
            can_add: false,
            can_edit: false,
            can_delete: true,
        };
        let flags = AccessFlags::from(&row);
        assert!(flags.allows(Action::Delete));
        assert!(!flags.allows(Action::Add));
    }
}
