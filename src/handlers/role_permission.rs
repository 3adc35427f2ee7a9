//! Role permission handlers
//!
//! Read and replace a role's menu access tree, and expose the permission check

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::entity::audit_log::AuditAction;
use crate::entity::{menu, role, role_menu_access, role_permission, role_sub_menu_access, sub_menu};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::now;
use crate::middleware::CurrentUser;
use crate::permission::{check, load_role_access, require, resource, AccessFlags, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "role_permission";

/// Flags of one sub-menu in a role's tree
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubMenuAccessNode {
    pub sub_menu_id: i64,
    pub name: String,
    pub path: String,
    #[serde(flatten)]
    pub flags: AccessFlags,
}

/// Flags of one menu and its children
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuAccessNode {
    pub menu_id: i64,
    pub name: String,
    pub path: String,
    #[serde(flatten)]
    pub flags: AccessFlags,
    pub sub_menus: Vec<SubMenuAccessNode>,
}

/// Full permission matrix of a role over every menu
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionTree {
    pub role_id: i64,
    pub role_name: String,
    pub is_admin: bool,
    pub menus: Vec<MenuAccessNode>,
}

/// Sub-menu flags in a replace request
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubMenuAccessInput {
    pub sub_menu_id: i64,
    #[serde(flatten)]
    pub flags: AccessFlags,
}

/// Menu flags in a replace request
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuAccessInput {
    pub menu_id: i64,
    #[serde(flatten)]
    pub flags: AccessFlags,
    #[serde(default)]
    pub sub_menus: Vec<SubMenuAccessInput>,
}

/// PUT /api/roles/:id/permissions body
#[derive(Debug, Deserialize, Serialize)]
pub struct ReplacePermissionsRequest {
    pub menus: Vec<MenuAccessInput>,
}

/// Query parameters for the check endpoint
#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub resource: String,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub resource: String,
    pub action: Action,
    pub allowed: bool,
}

/// Build the matrix of a role; rows without an access record read as all false
pub async fn load_tree(db: &DatabaseConnection, role_model: &role::Model) -> AppResult<PermissionTree> {
    let menus = menu::Entity::find()
        .order_by_asc(menu::Column::SortOrder)
        .order_by_asc(menu::Column::Id)
        .all(db)
        .await?;
    let sub_menus = sub_menu::Entity::find()
        .order_by_asc(sub_menu::Column::SortOrder)
        .order_by_asc(sub_menu::Column::Id)
        .all(db)
        .await?;

    let access = load_role_access(db, role_model.id).await?;

    let admin = role_model.is_admin();
    let pick = |flags: Option<AccessFlags>| {
        if admin {
            AccessFlags::ALL
        } else {
            flags.unwrap_or_default()
        }
    };

    let nodes = menus
        .into_iter()
        .map(|m| MenuAccessNode {
            menu_id: m.id,
            flags: pick(access.menus.get(&m.id).copied()),
            sub_menus: sub_menus
                .iter()
                .filter(|s| s.menu_id == m.id)
                .map(|s| SubMenuAccessNode {
                    sub_menu_id: s.id,
                    name: s.name.clone(),
                    path: s.path.clone(),
                    flags: pick(access.sub_menus.get(&s.id).copied()),
                })
                .collect(),
            name: m.name,
            path: m.path,
        })
        .collect();

    Ok(PermissionTree {
        role_id: role_model.id,
        role_name: role_model.name.clone(),
        is_admin: admin,
        menus: nodes,
    })
}

/// GET /api/roles/:id/permissions
pub async fn get_role_permissions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<PermissionTree>>> {
    require(&state.db, &current, resource::ROLES, Action::View).await?;

    let role_model = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("role not found")?;

    Ok(Json(ApiResponse::success(load_tree(&state.db, &role_model).await?)))
}

/// Reject unknown menus, foreign sub-menus and duplicates before writing
async fn validate_request(db: &DatabaseConnection, req: &ReplacePermissionsRequest) -> AppResult<()> {
    let menu_ids: HashSet<i64> = menu::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();
    let sub_parent: HashMap<i64, i64> = sub_menu::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s.menu_id))
        .collect();

    let mut seen_menus = HashSet::new();
    let mut seen_subs = HashSet::new();
    for item in &req.menus {
        if !menu_ids.contains(&item.menu_id) {
            return Err(AppError::BadRequest(format!("menu {} does not exist", item.menu_id)));
        }
        if !seen_menus.insert(item.menu_id) {
            return Err(AppError::BadRequest(format!("menu {} listed twice", item.menu_id)));
        }
        for sub in &item.sub_menus {
            match sub_parent.get(&sub.sub_menu_id) {
                Some(parent) if *parent == item.menu_id => {}
                Some(_) => {
                    return Err(AppError::BadRequest(format!(
                        "sub-menu {} does not belong to menu {}",
                        sub.sub_menu_id, item.menu_id
                    )))
                }
                None => {
                    return Err(AppError::BadRequest(format!(
                        "sub-menu {} does not exist",
                        sub.sub_menu_id
                    )))
                }
            }
            if !seen_subs.insert(sub.sub_menu_id) {
                return Err(AppError::BadRequest(format!(
                    "sub-menu {} listed twice",
                    sub.sub_menu_id
                )));
            }
        }
    }
    Ok(())
}

/// PUT /api/roles/:id/permissions
pub async fn replace_role_permissions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<ReplacePermissionsRequest>,
) -> AppResult<Json<ApiResponse<PermissionTree>>> {
    require(&state.db, &current, resource::ROLES, Action::Edit).await?;

    let role_model = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("role not found")?;
    validate_request(&state.db, &req).await?;

    let old_tree = load_tree(&state.db, &role_model).await?;
    let ts = now();

    let txn = state.db.begin().await?;

    let root = match role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(id))
        .one(&txn)
        .await?
    {
        Some(root) => {
            let mut active: role_permission::ActiveModel = root.into();
            active.updated_at = Set(ts);
            active.update(&txn).await?
        }
        None => {
            role_permission::ActiveModel {
                role_id: Set(id),
                created_at: Set(ts),
                updated_at: Set(ts),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    let old_access_ids: Vec<i64> = role_menu_access::Entity::find()
        .filter(role_menu_access::Column::RolePermissionId.eq(root.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();
    role_sub_menu_access::Entity::delete_many()
        .filter(role_sub_menu_access::Column::RoleMenuAccessId.is_in(old_access_ids))
        .exec(&txn)
        .await?;
    role_menu_access::Entity::delete_many()
        .filter(role_menu_access::Column::RolePermissionId.eq(root.id))
        .exec(&txn)
        .await?;

    for item in &req.menus {
        let access = role_menu_access::ActiveModel {
            role_permission_id: Set(root.id),
            menu_id: Set(item.menu_id),
            can_view: Set(item.flags.can_view),
            can_add: Set(item.flags.can_add),
            can_edit: Set(item.flags.can_edit),
            can_delete: Set(item.flags.can_delete),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for sub in &item.sub_menus {
            role_sub_menu_access::ActiveModel {
                role_menu_access_id: Set(access.id),
                sub_menu_id: Set(sub.sub_menu_id),
                can_view: Set(sub.flags.can_view),
                can_add: Set(sub.flags.can_add),
                can_edit: Set(sub.flags.can_edit),
                can_delete: Set(sub.flags.can_delete),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    tracing::info!("Permissions replaced for role {} by {}", role_model.name, current.email);
    state.audit.record(
        AuditEntry::new(&current, AuditAction::PermissionReplace, TABLE, Some(id))
            .with_old(&old_tree)
            .with_new(&req),
    );

    Ok(Json(ApiResponse::success(load_tree(&state.db, &role_model).await?)))
}

/// GET /api/permissions/check?resource=&action=
pub async fn check_permission(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<CheckQuery>,
) -> AppResult<Json<ApiResponse<CheckResponse>>> {
    let action: Action = query.action.parse()?;
    let allowed = current.is_admin() || check(&state.db, current.role_id, &query.resource, action).await?;

    Ok(Json(ApiResponse::success(CheckResponse {
        resource: query.resource,
        action,
        allowed,
    })))
}
