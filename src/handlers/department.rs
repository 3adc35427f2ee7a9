//! Department handlers
//!
//! Implements department CRUD operations

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::entity::audit_log::AuditAction;
use crate::entity::{department, department_transfer, employee};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{check_length, normalize_optional, now, require_text, Page, PageQuery};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "department";

/// Create / update department request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRequest {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
}

impl DepartmentRequest {
    fn validate(&self) -> AppResult<()> {
        require_text(&self.name, "name")?;
        check_length(self.name.trim(), "name", 64)?;
        if let Some(code) = &self.code {
            check_length(code.trim(), "code", 16)?;
        }
        Ok(())
    }
}

/// Department list filter
#[derive(Debug, Deserialize)]
pub struct DepartmentQuery {
    pub search: Option<String>,
}

/// Department with its current head count
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentResponse {
    #[serde(flatten)]
    pub department: department::Model,
    pub employee_count: u64,
}

/// GET /api/departments
pub async fn list_departments(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<DepartmentQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<DepartmentResponse>>>> {
    require(&state.db, &user, resource::DEPARTMENTS, Action::View).await?;

    let mut select = department::Entity::find();
    if let Some(search) = normalize_optional(query.search) {
        select = select.filter(
            department::Column::Name
                .contains(&search)
                .or(department::Column::Code.contains(&search)),
        );
    }

    let total = select.clone().count(&state.db).await?;
    let departments = select
        .order_by_asc(department::Column::Name)
        .offset(page.offset())
        .limit(page.limit())
        .all(&state.db)
        .await?;

    let mut items = Vec::with_capacity(departments.len());
    for dept in departments {
        let employee_count = employee::Entity::find()
            .filter(employee::Column::DepartmentId.eq(dept.id))
            .count(&state.db)
            .await?;
        items.push(DepartmentResponse {
            department: dept,
            employee_count,
        });
    }

    Ok(Json(ApiResponse::success(Page::new(items, total, &page))))
}

/// GET /api/departments/:id
pub async fn get_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<department::Model>>> {
    require(&state.db, &user, resource::DEPARTMENTS, Action::View).await?;

    let dept = department::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("department not found")?;

    Ok(Json(ApiResponse::success(dept)))
}

/// POST /api/departments
pub async fn create_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<DepartmentRequest>,
) -> AppResult<Json<ApiResponse<department::Model>>> {
    require(&state.db, &user, resource::DEPARTMENTS, Action::Add).await?;
    req.validate()?;

    let ts = now();
    let dept = department::ActiveModel {
        name: Set(req.name.trim().to_string()),
        code: Set(normalize_optional(req.code)),
        description: Set(normalize_optional(req.description)),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Department created: {} by {}", dept.name, user.email);
    state
        .audit
        .record(AuditEntry::new(&user, AuditAction::Create, TABLE, Some(dept.id)).with_new(&dept));

    Ok(Json(ApiResponse::success(dept)))
}

/// PUT /api/departments/:id
pub async fn update_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<DepartmentRequest>,
) -> AppResult<Json<ApiResponse<department::Model>>> {
    require(&state.db, &user, resource::DEPARTMENTS, Action::Edit).await?;
    req.validate()?;

    let old = department::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("department not found")?;

    let mut active: department::ActiveModel = old.clone().into();
    active.name = Set(req.name.trim().to_string());
    active.code = Set(normalize_optional(req.code));
    active.description = Set(normalize_optional(req.description));
    active.updated_at = Set(now());
    let dept = active.update(&state.db).await?;

    state.audit.record(
        AuditEntry::new(&user, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&dept),
    );

    Ok(Json(ApiResponse::success(dept)))
}

/// DELETE /api/departments/:id
pub async fn delete_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require(&state.db, &user, resource::DEPARTMENTS, Action::Delete).await?;

    let dept = department::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("department not found")?;

    let employees = employee::Entity::find()
        .filter(employee::Column::DepartmentId.eq(id))
        .count(&state.db)
        .await?;
    if employees > 0 {
        return Err(AppError::Conflict(format!(
            "department '{}' still has {} employee(s)",
            dept.name, employees
        )));
    }

    let transfers = department_transfer::Entity::find()
        .filter(
            Condition::any()
                .add(department_transfer::Column::FromDepartmentId.eq(id))
                .add(department_transfer::Column::ToDepartmentId.eq(id)),
        )
        .count(&state.db)
        .await?;
    if transfers > 0 {
        return Err(AppError::Conflict(format!(
            "department '{}' is referenced by {} transfer record(s)",
            dept.name, transfers
        )));
    }

    department::Entity::delete_by_id(id).exec(&state.db).await?;

    tracing::info!("Department deleted: {} by {}", dept.name, user.email);
    state
        .audit
        .record(AuditEntry::new(&user, AuditAction::Delete, TABLE, Some(id)).with_old(&dept));

    Ok(Json(ApiResponse::success_msg("department deleted")))
}
