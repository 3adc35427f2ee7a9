//! User handlers
//!
//! Dashboard account management

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::hash_password;
use crate::entity::audit_log::AuditAction;
use crate::entity::{role, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{check_length, normalize_optional, now, require_text, Page, PageQuery};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "app_user";
const MIN_PASSWORD_LEN: usize = 6;

/// User with its role name, password omitted
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role_id: i64,
    pub role_name: Option<String>,
    pub is_active: bool,
    pub last_login: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserResponse {
    pub fn new(m: user::Model, role: Option<role::Model>) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            role_id: m.role_id,
            role_name: role.map(|r| r.name),
            is_active: m.is_active,
            last_login: m.last_login,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Create user request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: i64,
    pub is_active: Option<bool>,
}

/// Update user request; a blank password keeps the current one
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub role_id: i64,
    pub is_active: Option<bool>,
}

/// User list filter
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub search: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
}

fn validate_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    require_text(&email, "email")?;
    check_length(&email, "email", 128)?;
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::Validation("email is not a valid address".to_string()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

async fn ensure_role(state: &AppState, role_id: i64) -> AppResult<role::Model> {
    role::Entity::find_by_id(role_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("role {} does not exist", role_id)))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<UserQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<UserResponse>>>> {
    require(&state.db, &current, resource::USERS, Action::View).await?;

    let mut select = user::Entity::find();
    if let Some(search) = normalize_optional(query.search) {
        select = select.filter(
            Condition::any()
                .add(user::Column::Name.contains(&search))
                .add(user::Column::Email.contains(&search)),
        );
    }
    if let Some(role_id) = query.role_id {
        select = select.filter(user::Column::RoleId.eq(role_id));
    }
    if let Some(is_active) = query.is_active {
        select = select.filter(user::Column::IsActive.eq(is_active));
    }

    let total = select.clone().count(&state.db).await?;
    let rows = select
        .find_also_related(role::Entity)
        .order_by_asc(user::Column::Id)
        .offset(page.offset())
        .limit(page.limit())
        .all(&state.db)
        .await?;

    let items = rows.into_iter().map(|(u, r)| UserResponse::new(u, r)).collect();
    Ok(Json(ApiResponse::success(Page::new(items, total, &page))))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    require(&state.db, &current, resource::USERS, Action::View).await?;

    let (u, r) = user::Entity::find_by_id(id)
        .find_also_related(role::Entity)
        .one(&state.db)
        .await?
        .ok_or_not_found("user not found")?;

    Ok(Json(ApiResponse::success(UserResponse::new(u, r))))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    require(&state.db, &current, resource::USERS, Action::Add).await?;

    require_text(&req.name, "name")?;
    check_length(req.name.trim(), "name", 64)?;
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;
    let db_role = ensure_role(&state, req.role_id).await?;

    let ts = now();
    // Duplicate emails surface as a unique violation (409)
    let created = user::ActiveModel {
        name: Set(req.name.trim().to_string()),
        email: Set(email),
        password: Set(hash_password(&state.config.auth, &req.password)?),
        role_id: Set(req.role_id),
        is_active: Set(req.is_active.unwrap_or(true)),
        last_login: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!("User created: {} by {}", created.email, current.email);
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Create, TABLE, Some(created.id)).with_new(&created),
    );

    Ok(Json(ApiResponse::success(UserResponse::new(created, Some(db_role)))))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    require(&state.db, &current, resource::USERS, Action::Edit).await?;

    require_text(&req.name, "name")?;
    check_length(req.name.trim(), "name", 64)?;
    let email = validate_email(&req.email)?;
    let password = normalize_optional(req.password);
    if let Some(password) = &password {
        validate_password(password)?;
    }

    let old = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("user not found")?;
    let db_role = ensure_role(&state, req.role_id).await?;

    let is_active = req.is_active.unwrap_or(old.is_active);
    if id == current.id && !is_active {
        return Err(AppError::BadRequest("you cannot deactivate your own account".to_string()));
    }

    let mut active: user::ActiveModel = old.clone().into();
    active.name = Set(req.name.trim().to_string());
    active.email = Set(email);
    active.role_id = Set(req.role_id);
    active.is_active = Set(is_active);
    if let Some(password) = password {
        active.password = Set(hash_password(&state.config.auth, &password)?);
    }
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;

    state.audit.record(
        AuditEntry::new(&current, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&updated),
    );

    Ok(Json(ApiResponse::success(UserResponse::new(updated, Some(db_role)))))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require(&state.db, &current, resource::USERS, Action::Delete).await?;

    if id == current.id {
        return Err(AppError::BadRequest("you cannot delete your own account".to_string()));
    }

    let old = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("user not found")?;

    // Users referenced by transfers are kept by the foreign key (400)
    user::Entity::delete_by_id(id).exec(&state.db).await?;

    tracing::info!("User deleted: {} by {}", old.email, current.email);
    state
        .audit
        .record(AuditEntry::new(&current, AuditAction::Delete, TABLE, Some(id)).with_old(&old));

    Ok(Json(ApiResponse::success_msg("user deleted")))
}
