//! Department transfer handlers
//!
//! Moving an employee writes the history row and the new department in one
//! transaction.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::audit_log::AuditAction;
use crate::entity::{department, department_transfer, employee, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{check_length, normalize_optional, now, Page, PageQuery};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "department_transfer";

/// Transfer request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub employee_id: i64,
    pub to_department_id: i64,
    /// Defaults to today
    pub transfer_date: Option<NaiveDate>,
    pub reason: Option<String>,
}

/// Transfer list filters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferQuery {
    pub employee_id: Option<i64>,
    pub department_id: Option<i64>,
}

/// Transfer with display names resolved
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    #[serde(flatten)]
    pub transfer: department_transfer::Model,
    pub employee_name: Option<String>,
    pub employee_code: Option<String>,
    pub from_department_name: Option<String>,
    pub to_department_name: Option<String>,
    pub authorized_by_name: Option<String>,
}

/// Resolve names for a batch of transfers with one query per table
async fn describe(
    state: &AppState,
    transfers: Vec<department_transfer::Model>,
) -> AppResult<Vec<TransferResponse>> {
    let employee_ids: Vec<i64> = transfers.iter().map(|t| t.employee_id).collect();
    let department_ids: Vec<i64> = transfers
        .iter()
        .flat_map(|t| [t.from_department_id, t.to_department_id])
        .collect();
    let user_ids: Vec<i64> = transfers.iter().map(|t| t.authorized_by).collect();

    let employees: HashMap<i64, employee::Model> = employee::Entity::find()
        .filter(employee::Column::Id.is_in(employee_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();
    let departments: HashMap<i64, String> = department::Entity::find()
        .filter(department::Column::Id.is_in(department_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();
    let users: HashMap<i64, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    Ok(transfers
        .into_iter()
        .map(|t| {
            let emp = employees.get(&t.employee_id);
            TransferResponse {
                employee_name: emp.map(|e| e.name.clone()),
                employee_code: emp.map(|e| e.employee_code.clone()),
                from_department_name: departments.get(&t.from_department_id).cloned(),
                to_department_name: departments.get(&t.to_department_id).cloned(),
                authorized_by_name: users.get(&t.authorized_by).cloned(),
                transfer: t,
            }
        })
        .collect())
}

/// GET /api/department-transfers
pub async fn list_transfers(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<TransferQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<TransferResponse>>>> {
    require(&state.db, &current, resource::DEPARTMENT_TRANSFERS, Action::View).await?;

    let mut select = department_transfer::Entity::find();
    if let Some(employee_id) = query.employee_id {
        select = select.filter(department_transfer::Column::EmployeeId.eq(employee_id));
    }
    if let Some(department_id) = query.department_id {
        select = select.filter(
            department_transfer::Column::FromDepartmentId
                .eq(department_id)
                .or(department_transfer::Column::ToDepartmentId.eq(department_id)),
        );
    }

    let total = select.clone().count(&state.db).await?;
    let transfers = select
        .order_by_desc(department_transfer::Column::TransferDate)
        .order_by_desc(department_transfer::Column::Id)
        .offset(page.offset())
        .limit(page.limit())
        .all(&state.db)
        .await?;

    let items = describe(&state, transfers).await?;
    Ok(Json(ApiResponse::success(Page::new(items, total, &page))))
}

/// GET /api/department-transfers/:id
pub async fn get_transfer(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<TransferResponse>>> {
    require(&state.db, &current, resource::DEPARTMENT_TRANSFERS, Action::View).await?;

    let transfer = department_transfer::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("transfer not found")?;

    let item = describe(&state, vec![transfer])
        .await?
        .pop()
        .ok_or_not_found("transfer not found")?;
    Ok(Json(ApiResponse::success(item)))
}

/// POST /api/department-transfers
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<TransferRequest>,
) -> AppResult<Json<ApiResponse<TransferResponse>>> {
    require(&state.db, &current, resource::DEPARTMENT_TRANSFERS, Action::Add).await?;
    if let Some(reason) = &req.reason {
        check_length(reason.trim(), "reason", 1000)?;
    }

    let emp = employee::Entity::find_by_id(req.employee_id)
        .one(&state.db)
        .await?
        .ok_or_not_found("employee not found")?;
    department::Entity::find_by_id(req.to_department_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest(format!("department {} does not exist", req.to_department_id))
        })?;
    if emp.department_id == req.to_department_id {
        return Err(AppError::BadRequest(
            "employee already belongs to the target department".to_string(),
        ));
    }

    let ts = now();
    let transfer_date = req
        .transfer_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let txn = state.db.begin().await?;

    let transfer = department_transfer::ActiveModel {
        employee_id: Set(emp.id),
        from_department_id: Set(emp.department_id),
        to_department_id: Set(req.to_department_id),
        authorized_by: Set(current.id),
        transfer_date: Set(transfer_date),
        reason: Set(normalize_optional(req.reason)),
        created_at: Set(ts),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut active: employee::ActiveModel = emp.clone().into();
    active.department_id = Set(req.to_department_id);
    active.updated_at = Set(ts);
    let moved = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        "Employee {} transferred from department {} to {} by {}",
        emp.employee_code,
        emp.department_id,
        req.to_department_id,
        current.email
    );
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Transfer, TABLE, Some(transfer.id))
            .with_old(&emp)
            .with_new(&serde_json::json!({ "transfer": &transfer, "employee": &moved })),
    );

    let item = describe(&state, vec![transfer])
        .await?
        .pop()
        .ok_or_not_found("transfer not found")?;
    Ok(Json(ApiResponse::success(item)))
}
