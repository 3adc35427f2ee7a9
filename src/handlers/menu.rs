//! Menu handlers
//!
//! Sidebar menus and their sub-menus. Paths double as permission resources,
//! so changes here change what the permission check can match.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::entity::audit_log::AuditAction;
use crate::entity::{menu, role_menu_access, role_sub_menu_access, sub_menu};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{check_length, normalize_optional, now, require_text};
use crate::middleware::CurrentUser;
use crate::permission::{load_role_access, require, resource, AccessFlags, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "menu";

/// Sub-menu item of a create / update request; `id` marks an existing row
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubMenuInput {
    pub id: Option<i64>,
    pub name: String,
    pub path: String,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Create / update menu request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuRequest {
    pub name: String,
    pub path: String,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sub_menus: Vec<SubMenuInput>,
}

/// Menu with its children
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuResponse {
    #[serde(flatten)]
    pub menu: menu::Model,
    pub sub_menus: Vec<sub_menu::Model>,
}

/// Sub-menu visible to the caller
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MySubMenu {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub icon: Option<String>,
    pub sort_order: i32,
    #[serde(flatten)]
    pub flags: AccessFlags,
}

/// Menu visible to the caller
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyMenu {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub icon: Option<String>,
    pub sort_order: i32,
    #[serde(flatten)]
    pub flags: AccessFlags,
    pub sub_menus: Vec<MySubMenu>,
}

fn validate_path(path: &str, field: &str) -> AppResult<String> {
    let path = path.trim().to_string();
    require_text(&path, field)?;
    check_length(&path, field, 128)?;
    if !path.starts_with('/') {
        return Err(AppError::Validation(format!("{} must start with '/'", field)));
    }
    Ok(path)
}

fn validate(req: &MenuRequest) -> AppResult<()> {
    require_text(&req.name, "name")?;
    check_length(req.name.trim(), "name", 64)?;
    let mut paths = HashSet::new();
    paths.insert(validate_path(&req.path, "path")?);
    for sub in &req.sub_menus {
        require_text(&sub.name, "subMenus.name")?;
        check_length(sub.name.trim(), "subMenus.name", 64)?;
        if !paths.insert(validate_path(&sub.path, "subMenus.path")?) {
            return Err(AppError::Validation(format!("duplicate path '{}'", sub.path.trim())));
        }
    }
    Ok(())
}

fn sub_menu_model(menu_id: i64, input: &SubMenuInput, ts: i64) -> sub_menu::ActiveModel {
    sub_menu::ActiveModel {
        menu_id: Set(menu_id),
        name: Set(input.name.trim().to_string()),
        path: Set(input.path.trim().to_string()),
        icon: Set(normalize_optional(input.icon.clone())),
        sort_order: Set(input.sort_order.unwrap_or(0)),
        is_active: Set(input.is_active.unwrap_or(true)),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
}

async fn children<C: ConnectionTrait>(db: &C, menu_id: i64) -> Result<Vec<sub_menu::Model>, DbErr> {
    sub_menu::Entity::find()
        .filter(sub_menu::Column::MenuId.eq(menu_id))
        .order_by_asc(sub_menu::Column::SortOrder)
        .order_by_asc(sub_menu::Column::Id)
        .all(db)
        .await
}

/// Remove sub-menus together with the access rows pointing at them
async fn delete_sub_menus<C: ConnectionTrait>(db: &C, ids: Vec<i64>) -> Result<(), DbErr> {
    if ids.is_empty() {
        return Ok(());
    }
    role_sub_menu_access::Entity::delete_many()
        .filter(role_sub_menu_access::Column::SubMenuId.is_in(ids.clone()))
        .exec(db)
        .await?;
    sub_menu::Entity::delete_many()
        .filter(sub_menu::Column::Id.is_in(ids))
        .exec(db)
        .await?;
    Ok(())
}

/// GET /api/menus
pub async fn list_menus(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<MenuResponse>>>> {
    require(&state.db, &current, resource::MENUS, Action::View).await?;

    let menus = menu::Entity::find()
        .order_by_asc(menu::Column::SortOrder)
        .order_by_asc(menu::Column::Id)
        .find_with_related(sub_menu::Entity)
        .all(&state.db)
        .await?;

    let items = menus
        .into_iter()
        .map(|(m, mut subs)| {
            subs.sort_by_key(|s| (s.sort_order, s.id));
            MenuResponse { menu: m, sub_menus: subs }
        })
        .collect();

    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/menus/:id
pub async fn get_menu(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<MenuResponse>>> {
    require(&state.db, &current, resource::MENUS, Action::View).await?;

    let m = menu::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("menu not found")?;
    let sub_menus = children(&state.db, id).await?;

    Ok(Json(ApiResponse::success(MenuResponse { menu: m, sub_menus })))
}

/// POST /api/menus
pub async fn create_menu(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<MenuRequest>,
) -> AppResult<Json<ApiResponse<MenuResponse>>> {
    require(&state.db, &current, resource::MENUS, Action::Add).await?;
    validate(&req)?;
    if req.sub_menus.iter().any(|s| s.id.is_some()) {
        return Err(AppError::Validation("new sub-menus must not carry an id".to_string()));
    }

    let ts = now();
    let txn = state.db.begin().await?;

    let created = menu::ActiveModel {
        name: Set(req.name.trim().to_string()),
        path: Set(req.path.trim().to_string()),
        icon: Set(normalize_optional(req.icon.clone())),
        sort_order: Set(req.sort_order.unwrap_or(0)),
        is_active: Set(req.is_active.unwrap_or(true)),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for sub in &req.sub_menus {
        sub_menu_model(created.id, sub, ts).insert(&txn).await?;
    }
    let sub_menus = children(&txn, created.id).await?;

    txn.commit().await?;

    tracing::info!("Menu created: {} by {}", created.path, current.email);
    let response = MenuResponse {
        menu: created,
        sub_menus,
    };
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Create, TABLE, Some(response.menu.id)).with_new(&response),
    );

    Ok(Json(ApiResponse::success(response)))
}

/// PUT /api/menus/:id
///
/// Children are reconciled against the request: listed ids are updated,
/// entries without an id are created and unlisted children are deleted.
pub async fn update_menu(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<MenuRequest>,
) -> AppResult<Json<ApiResponse<MenuResponse>>> {
    require(&state.db, &current, resource::MENUS, Action::Edit).await?;
    validate(&req)?;

    let old_menu = menu::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("menu not found")?;
    let old_children = children(&state.db, id).await?;

    let existing: HashSet<i64> = old_children.iter().map(|s| s.id).collect();
    let mut kept = HashSet::new();
    for sub_id in req.sub_menus.iter().filter_map(|s| s.id) {
        if !existing.contains(&sub_id) {
            return Err(AppError::BadRequest(format!(
                "sub-menu {} does not belong to menu {}",
                sub_id, id
            )));
        }
        if !kept.insert(sub_id) {
            return Err(AppError::BadRequest(format!("sub-menu {} listed twice", sub_id)));
        }
    }

    let ts = now();
    let txn = state.db.begin().await?;

    // Drop removed children first so their paths can be reused below
    let removed: Vec<i64> = existing.difference(&kept).copied().collect();
    delete_sub_menus(&txn, removed).await?;

    let mut active: menu::ActiveModel = old_menu.clone().into();
    active.name = Set(req.name.trim().to_string());
    active.path = Set(req.path.trim().to_string());
    active.icon = Set(normalize_optional(req.icon.clone()));
    active.sort_order = Set(req.sort_order.unwrap_or(old_menu.sort_order));
    active.is_active = Set(req.is_active.unwrap_or(old_menu.is_active));
    active.updated_at = Set(ts);
    let updated = active.update(&txn).await?;

    for sub in &req.sub_menus {
        let stored = sub.id.and_then(|sub_id| old_children.iter().find(|c| c.id == sub_id));
        match stored {
            Some(old_sub) => {
                // Omitted fields keep their stored values
                let mut row: sub_menu::ActiveModel = old_sub.clone().into();
                row.name = Set(sub.name.trim().to_string());
                row.path = Set(sub.path.trim().to_string());
                if sub.icon.is_some() {
                    row.icon = Set(normalize_optional(sub.icon.clone()));
                }
                row.sort_order = Set(sub.sort_order.unwrap_or(old_sub.sort_order));
                row.is_active = Set(sub.is_active.unwrap_or(old_sub.is_active));
                row.updated_at = Set(ts);
                row.update(&txn).await?;
            }
            None => {
                sub_menu_model(id, sub, ts).insert(&txn).await?;
            }
        }
    }
    let sub_menus = children(&txn, id).await?;

    txn.commit().await?;

    let old = MenuResponse {
        menu: old_menu,
        sub_menus: old_children,
    };
    let response = MenuResponse {
        menu: updated,
        sub_menus,
    };
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&response),
    );

    Ok(Json(ApiResponse::success(response)))
}

/// DELETE /api/menus/:id
pub async fn delete_menu(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require(&state.db, &current, resource::MENUS, Action::Delete).await?;

    let old_menu = menu::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("menu not found")?;
    let old_children = children(&state.db, id).await?;

    let txn = state.db.begin().await?;
    delete_sub_menus(&txn, old_children.iter().map(|s| s.id).collect()).await?;
    role_menu_access::Entity::delete_many()
        .filter(role_menu_access::Column::MenuId.eq(id))
        .exec(&txn)
        .await?;
    menu::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!("Menu deleted: {} by {}", old_menu.path, current.email);
    let old = MenuResponse {
        menu: old_menu,
        sub_menus: old_children,
    };
    state
        .audit
        .record(AuditEntry::new(&current, AuditAction::Delete, TABLE, Some(id)).with_old(&old));

    Ok(Json(ApiResponse::success_msg("menu deleted")))
}

/// GET /api/menus/mine
///
/// Active menus the caller's role may view, each with the role's flags
pub async fn my_menus(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<MyMenu>>>> {
    let menus = menu::Entity::find()
        .filter(menu::Column::IsActive.eq(true))
        .order_by_asc(menu::Column::SortOrder)
        .order_by_asc(menu::Column::Id)
        .all(&state.db)
        .await?;
    let sub_menus = sub_menu::Entity::find()
        .filter(sub_menu::Column::IsActive.eq(true))
        .order_by_asc(sub_menu::Column::SortOrder)
        .order_by_asc(sub_menu::Column::Id)
        .all(&state.db)
        .await?;

    let admin = current.is_admin();
    let access = if admin {
        Default::default()
    } else {
        load_role_access(&state.db, current.role_id).await?
    };
    let flags_for = |stored: Option<&AccessFlags>| {
        if admin {
            Some(AccessFlags::ALL)
        } else {
            stored.copied().filter(|f| f.can_view)
        }
    };

    let mut visible = Vec::new();
    for m in menus {
        let Some(flags) = flags_for(access.menus.get(&m.id)) else {
            continue;
        };
        let subs = sub_menus
            .iter()
            .filter(|s| s.menu_id == m.id)
            .filter_map(|s| {
                flags_for(access.sub_menus.get(&s.id)).map(|flags| MySubMenu {
                    id: s.id,
                    name: s.name.clone(),
                    path: s.path.clone(),
                    icon: s.icon.clone(),
                    sort_order: s.sort_order,
                    flags,
                })
            })
            .collect();
        visible.push(MyMenu {
            id: m.id,
            name: m.name,
            path: m.path,
            icon: m.icon,
            sort_order: m.sort_order,
            flags,
            sub_menus: subs,
        });
    }

    Ok(Json(ApiResponse::success(visible)))
}
