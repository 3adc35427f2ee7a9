//! Role handlers
//!
//! Implements role CRUD; the access tree lives in `role_permission`

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::entity::audit_log::AuditAction;
use crate::entity::{role, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{check_length, normalize_optional, now, require_text};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "role";

/// Create / update role request
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Role with the number of users holding it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    #[serde(flatten)]
    pub role: role::Model,
    pub user_count: u64,
}

fn validate(req: &RoleRequest) -> AppResult<String> {
    require_text(&req.name, "name")?;
    let name = req.name.trim().to_string();
    check_length(&name, "name", 64)?;
    Ok(name)
}

/// GET /api/roles
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<RoleResponse>>>> {
    require(&state.db, &current, resource::ROLES, Action::View).await?;

    let roles = role::Entity::find()
        .order_by_asc(role::Column::Id)
        .all(&state.db)
        .await?;

    let mut items = Vec::with_capacity(roles.len());
    for r in roles {
        let user_count = user::Entity::find()
            .filter(user::Column::RoleId.eq(r.id))
            .count(&state.db)
            .await?;
        items.push(RoleResponse { role: r, user_count });
    }

    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/roles/:id
pub async fn get_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<role::Model>>> {
    require(&state.db, &current, resource::ROLES, Action::View).await?;

    let r = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("role not found")?;

    Ok(Json(ApiResponse::success(r)))
}

/// POST /api/roles
pub async fn create_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<ApiResponse<role::Model>>> {
    require(&state.db, &current, resource::ROLES, Action::Add).await?;
    let name = validate(&req)?;

    let ts = now();
    let created = role::ActiveModel {
        name: Set(name),
        description: Set(normalize_optional(req.description)),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Role created: {} by {}", created.name, current.email);
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Create, TABLE, Some(created.id)).with_new(&created),
    );

    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/roles/:id
pub async fn update_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<ApiResponse<role::Model>>> {
    require(&state.db, &current, resource::ROLES, Action::Edit).await?;
    let name = validate(&req)?;

    let old = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("role not found")?;

    // The superuser role is matched by name
    if old.is_admin() && name != old.name {
        return Err(AppError::BadRequest("the admin role cannot be renamed".to_string()));
    }

    let mut active: role::ActiveModel = old.clone().into();
    active.name = Set(name);
    active.description = Set(normalize_optional(req.description));
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;

    state.audit.record(
        AuditEntry::new(&current, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&updated),
    );

    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/roles/:id
pub async fn delete_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require(&state.db, &current, resource::ROLES, Action::Delete).await?;

    let old = role::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("role not found")?;

    if old.is_admin() {
        return Err(AppError::BadRequest("the admin role cannot be deleted".to_string()));
    }

    let holders = user::Entity::find()
        .filter(user::Column::RoleId.eq(id))
        .count(&state.db)
        .await?;
    if holders > 0 {
        return Err(AppError::Conflict(format!(
            "role '{}' is still assigned to {} user(s)",
            old.name, holders
        )));
    }

    // role_permission and its access rows cascade
    role::Entity::delete_by_id(id).exec(&state.db).await?;

    tracing::info!("Role deleted: {} by {}", old.name, current.email);
    state
        .audit
        .record(AuditEntry::new(&current, AuditAction::Delete, TABLE, Some(id)).with_old(&old));

    Ok(Json(ApiResponse::success_msg("role deleted")))
}
