//! Authentication handlers
//!
//! Implements login, current user and password change

use axum::{extract::State, http::HeaderMap, response::Json, Extension};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, issue_token, verify_password, Claims};
use crate::entity::audit_log::AuditAction;
use crate::entity::{role, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::user::UserResponse;
use crate::handlers::{now, require_text};
use crate::middleware::auth::client_ip;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "app_user";
const BAD_CREDENTIALS: &str = "invalid email or password";

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Change password request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    require_text(&req.email, "email")?;
    require_text(&req.password, "password")?;

    let email = req.email.trim().to_lowercase();
    let ip = client_ip(&headers);

    let found = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .find_also_related(role::Entity)
        .one(&state.db)
        .await?;

    let reject = |reason: &str| {
        tracing::warn!("Login failed for {}: {}", email, reason);
        state.audit.record(AuditEntry::anonymous(
            &email,
            AuditAction::LoginFailed,
            TABLE,
            ip.clone(),
        ));
        AppError::Unauthorized(BAD_CREDENTIALS.to_string())
    };

    let (db_user, db_role) = match found {
        Some(pair) => pair,
        None => return Err(reject("unknown email")),
    };
    if !verify_password(&req.password, &db_user.password) {
        return Err(reject("wrong password"));
    }
    if !db_user.is_active {
        return Err(reject("account disabled"));
    }

    let claims = Claims::new(
        db_user.id,
        db_user.email.clone(),
        db_user.role_id,
        state.config.auth.token_ttl_hours,
    );
    let token = issue_token(&state.config.auth, &claims)?;

    let user_id = db_user.id;
    let mut active: user::ActiveModel = db_user.into();
    active.last_login = Set(Some(now()));
    let db_user = active.update(&state.db).await?;

    tracing::info!("User logged in: {}", db_user.email);
    state.audit.record(AuditEntry {
        user_id: Some(user_id),
        record_id: Some(user_id),
        ..AuditEntry::anonymous(&db_user.email, AuditAction::Login, TABLE, ip)
    });

    Ok(Json(ApiResponse::success(LoginResponse {
        token,
        user: UserResponse::new(db_user, db_role),
    })))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let (db_user, db_role) = user::Entity::find_by_id(current.id)
        .find_also_related(role::Entity)
        .one(&state.db)
        .await?
        .ok_or_not_found("user not found")?;

    Ok(Json(ApiResponse::success(UserResponse::new(db_user, db_role))))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    require_text(&req.current_password, "currentPassword")?;
    if req.new_password.chars().count() < 6 {
        return Err(AppError::Validation(
            "new password must be at least 6 characters".to_string(),
        ));
    }

    let db_user = user::Entity::find_by_id(current.id)
        .one(&state.db)
        .await?
        .ok_or_not_found("user not found")?;

    if !verify_password(&req.current_password, &db_user.password) {
        tracing::warn!("Password change rejected for {}: wrong current password", current.email);
        return Err(AppError::BadRequest("current password is incorrect".to_string()));
    }

    let mut active: user::ActiveModel = db_user.into();
    active.password = Set(hash_password(&state.config.auth, &req.new_password)?);
    active.updated_at = Set(now());
    active.update(&state.db).await?;

    tracing::info!("Password changed for {}", current.email);
    state.audit.record(AuditEntry::new(
        &current,
        AuditAction::PasswordChange,
        TABLE,
        Some(current.id),
    ));

    Ok(Json(ApiResponse::success_msg("password changed")))
}
