//! Employee handlers
//!
//! Employee records, search and photo upload

use axum::{
    extract::{Multipart, Path, Query, State},
    response::Json,
    Extension,
};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::entity::audit_log::AuditAction;
use crate::entity::{department, employee};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{check_length, normalize_optional, now, require_text, Page, PageQuery};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::storage::{self, FormData, PHOTO_FOLDER};

const TABLE: &str = "employee";

/// Create / update employee request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequest {
    pub employee_code: String,
    pub name: String,
    pub designation: Option<String>,
    pub department_id: i64,
    pub category: Option<String>,
    pub section: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub blood_group: Option<String>,
    pub join_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl EmployeeRequest {
    fn validate(&self) -> AppResult<()> {
        require_text(&self.employee_code, "employeeCode")?;
        check_length(self.employee_code.trim(), "employeeCode", 32)?;
        require_text(&self.name, "name")?;
        check_length(self.name.trim(), "name", 128)?;
        let optional = [
            (&self.designation, "designation", 64),
            (&self.category, "category", 32),
            (&self.section, "section", 64),
            (&self.phone, "phone", 20),
            (&self.email, "email", 128),
            (&self.blood_group, "bloodGroup", 8),
        ];
        for (value, field, max) in optional {
            if let Some(v) = value {
                check_length(v.trim(), field, max)?;
            }
        }
        Ok(())
    }

    fn apply(self, active: &mut employee::ActiveModel) {
        active.employee_code = Set(self.employee_code.trim().to_string());
        active.name = Set(self.name.trim().to_string());
        active.designation = Set(normalize_optional(self.designation));
        active.department_id = Set(self.department_id);
        active.category = Set(normalize_optional(self.category));
        active.section = Set(normalize_optional(self.section));
        active.phone = Set(normalize_optional(self.phone));
        active.email = Set(normalize_optional(self.email));
        active.blood_group = Set(normalize_optional(self.blood_group));
        active.join_date = Set(self.join_date);
    }
}

/// Employee list filters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    pub department_id: Option<i64>,
    pub category: Option<String>,
    pub section: Option<String>,
    pub is_active: Option<bool>,
    /// Matches name or employee code
    pub search: Option<String>,
}

/// Employee with department name and photo URL
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeResponse {
    #[serde(flatten)]
    pub employee: employee::Model,
    pub department_name: Option<String>,
    pub photo_url: Option<String>,
}

impl EmployeeResponse {
    pub fn new(state: &AppState, employee: employee::Model, department: Option<department::Model>) -> Self {
        let photo_url = employee.photo.as_deref().map(|p| state.upload_url(p));
        Self {
            employee,
            department_name: department.map(|d| d.name),
            photo_url,
        }
    }
}

async fn ensure_department(state: &AppState, department_id: i64) -> AppResult<department::Model> {
    department::Entity::find_by_id(department_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("department {} does not exist", department_id)))
}

/// GET /api/employees
pub async fn list_employees(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<EmployeeQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<EmployeeResponse>>>> {
    require(&state.db, &current, resource::EMPLOYEES, Action::View).await?;

    let mut select = employee::Entity::find();
    if let Some(department_id) = query.department_id {
        select = select.filter(employee::Column::DepartmentId.eq(department_id));
    }
    if let Some(category) = normalize_optional(query.category) {
        select = select.filter(employee::Column::Category.eq(category));
    }
    if let Some(section) = normalize_optional(query.section) {
        select = select.filter(employee::Column::Section.eq(section));
    }
    if let Some(is_active) = query.is_active {
        select = select.filter(employee::Column::IsActive.eq(is_active));
    }
    if let Some(search) = normalize_optional(query.search) {
        select = select.filter(
            Condition::any()
                .add(employee::Column::Name.contains(&search))
                .add(employee::Column::EmployeeCode.contains(&search)),
        );
    }

    let total = select.clone().count(&state.db).await?;
    let rows = select
        .find_also_related(department::Entity)
        .order_by_asc(employee::Column::EmployeeCode)
        .offset(page.offset())
        .limit(page.limit())
        .all(&state.db)
        .await?;

    let items = rows
        .into_iter()
        .map(|(e, d)| EmployeeResponse::new(&state, e, d))
        .collect();
    Ok(Json(ApiResponse::success(Page::new(items, total, &page))))
}

/// GET /api/employees/:id
pub async fn get_employee(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    require(&state.db, &current, resource::EMPLOYEES, Action::View).await?;

    let (e, d) = employee::Entity::find_by_id(id)
        .find_also_related(department::Entity)
        .one(&state.db)
        .await?
        .ok_or_not_found("employee not found")?;

    Ok(Json(ApiResponse::success(EmployeeResponse::new(&state, e, d))))
}

/// POST /api/employees
pub async fn create_employee(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<EmployeeRequest>,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    require(&state.db, &current, resource::EMPLOYEES, Action::Add).await?;
    req.validate()?;
    let dept = ensure_department(&state, req.department_id).await?;

    let ts = now();
    let mut active = employee::ActiveModel {
        is_active: Set(req.is_active.unwrap_or(true)),
        photo: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    };
    req.apply(&mut active);
    let created = active.insert(&state.db).await?;

    tracing::info!("Employee created: {} by {}", created.employee_code, current.email);
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Create, TABLE, Some(created.id)).with_new(&created),
    );

    Ok(Json(ApiResponse::success(EmployeeResponse::new(&state, created, Some(dept)))))
}

/// PUT /api/employees/:id
pub async fn update_employee(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<EmployeeRequest>,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    require(&state.db, &current, resource::EMPLOYEES, Action::Edit).await?;
    req.validate()?;

    let old = employee::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("employee not found")?;
    let dept = ensure_department(&state, req.department_id).await?;

    let mut active: employee::ActiveModel = old.clone().into();
    active.is_active = Set(req.is_active.unwrap_or(old.is_active));
    active.updated_at = Set(now());
    req.apply(&mut active);
    let updated = active.update(&state.db).await?;

    state.audit.record(
        AuditEntry::new(&current, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&updated),
    );

    Ok(Json(ApiResponse::success(EmployeeResponse::new(&state, updated, Some(dept)))))
}

/// DELETE /api/employees/:id
pub async fn delete_employee(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require(&state.db, &current, resource::EMPLOYEES, Action::Delete).await?;

    let old = employee::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("employee not found")?;

    // Cards and transfers referencing the employee block this through the foreign key
    employee::Entity::delete_by_id(id).exec(&state.db).await?;

    if let Some(photo) = &old.photo {
        storage::remove_file(&state.config.upload_dir, photo).await;
    }

    tracing::info!("Employee deleted: {} by {}", old.employee_code, current.email);
    state
        .audit
        .record(AuditEntry::new(&current, AuditAction::Delete, TABLE, Some(id)).with_old(&old));

    Ok(Json(ApiResponse::success_msg("employee deleted")))
}

/// POST /api/employees/:id/photo
///
/// Multipart field `photo`; replaces and deletes any previous photo
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    require(&state.db, &current, resource::EMPLOYEES, Action::Edit).await?;

    let (old, dept) = employee::Entity::find_by_id(id)
        .find_also_related(department::Entity)
        .one(&state.db)
        .await?
        .ok_or_not_found("employee not found")?;

    let mut form = FormData::read(&mut multipart).await?;
    let file = form
        .take_file("photo")
        .ok_or_else(|| AppError::Validation("photo file is required".to_string()))?;
    let relative = storage::save_image(&state.config.upload_dir, PHOTO_FOLDER, &file).await?;

    let mut active: employee::ActiveModel = old.clone().into();
    active.photo = Set(Some(relative.clone()));
    active.updated_at = Set(now());
    let updated = match active.update(&state.db).await {
        Ok(updated) => updated,
        Err(e) => {
            storage::remove_file(&state.config.upload_dir, &relative).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = &old.photo {
        storage::remove_file(&state.config.upload_dir, previous).await;
    }

    state.audit.record(
        AuditEntry::new(&current, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&updated),
    );

    Ok(Json(ApiResponse::success(EmployeeResponse::new(&state, updated, dept))))
}
