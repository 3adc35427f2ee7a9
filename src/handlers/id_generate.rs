//! Generated ID card handlers
//!
//! Card issuance, the print lifecycle, rendering and public QR verification

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::NaiveDate;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::card::{self, CardData, CardDocument, CardLayout, InvalidReason, TemplateFrame};
use crate::entity::audit_log::AuditAction;
use crate::entity::id_generate::CardStatus;
use crate::entity::{department, employee, id_card_template, id_generate};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{now, Page, PageQuery};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

const TABLE: &str = "id_generate";
const MAX_BULK: usize = 500;

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Create card request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    pub employee_id: i64,
    pub template_id: i64,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Update card request, only while the card is still `created`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    pub template_id: Option<i64>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Status transition request
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: CardStatus,
}

/// Bulk status transition request
#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    pub ids: Vec<i64>,
    pub status: CardStatus,
}

#[derive(Debug, Serialize)]
pub struct BulkFailure {
    pub id: i64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BulkStatusResponse {
    pub updated: Vec<i64>,
    pub failed: Vec<BulkFailure>,
}

/// Card list filters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardQuery {
    pub status: Option<CardStatus>,
    pub employee_id: Option<i64>,
    pub template_id: Option<i64>,
}

/// Render options
#[derive(Debug, Deserialize)]
pub struct RenderQuery {
    pub scale: Option<f64>,
}

/// Card with employee and template names
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    #[serde(flatten)]
    pub card: id_generate::Model,
    pub employee_name: Option<String>,
    pub employee_code: Option<String>,
    pub template_name: Option<String>,
    pub qr_payload: String,
}

/// Employee details shown to whoever scans a card
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedEmployee {
    pub name: String,
    pub employee_code: String,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub blood_group: Option<String>,
    pub photo_url: Option<String>,
}

/// Public verification result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
    pub status: CardStatus,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub employee: VerifiedEmployee,
}

async fn describe(state: &AppState, cards: Vec<id_generate::Model>) -> AppResult<Vec<CardResponse>> {
    let employee_ids: Vec<i64> = cards.iter().map(|c| c.employee_id).collect();
    let template_ids: Vec<i64> = cards.iter().map(|c| c.template_id).collect();

    let employees: HashMap<i64, employee::Model> = employee::Entity::find()
        .filter(employee::Column::Id.is_in(employee_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();
    let templates: HashMap<i64, String> = id_card_template::Entity::find()
        .filter(id_card_template::Column::Id.is_in(template_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();

    Ok(cards
        .into_iter()
        .map(|c| {
            let emp = employees.get(&c.employee_id);
            CardResponse {
                employee_name: emp.map(|e| e.name.clone()),
                employee_code: emp.map(|e| e.employee_code.clone()),
                template_name: templates.get(&c.template_id).cloned(),
                qr_payload: card::qr_payload(&state.config.public_url, &c.qr_code),
                card: c,
            }
        })
        .collect())
}

async fn describe_one(state: &AppState, card: id_generate::Model) -> AppResult<CardResponse> {
    describe(state, vec![card])
        .await?
        .pop()
        .ok_or_not_found("card not found")
}

async fn find_card(state: &AppState, id: i64) -> AppResult<id_generate::Model> {
    id_generate::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("card not found")
}

async fn active_template(state: &AppState, template_id: i64) -> AppResult<id_card_template::Model> {
    let template = id_card_template::Entity::find_by_id(template_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("template {} does not exist", template_id)))?;
    if !template.is_active {
        return Err(AppError::BadRequest(format!("template '{}' is inactive", template.name)));
    }
    Ok(template)
}

fn check_dates(issue_date: NaiveDate, expiry_date: NaiveDate) -> AppResult<()> {
    if expiry_date <= issue_date {
        return Err(AppError::Validation(
            "expiryDate must be after issueDate".to_string(),
        ));
    }
    Ok(())
}

/// Move a card to `next`, recording the change
async fn transition(
    state: &AppState,
    current: &CurrentUser,
    old: id_generate::Model,
    next: CardStatus,
) -> AppResult<id_generate::Model> {
    let from = old.card_status();
    if !from.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "cannot change card status from {} to {}",
            from, next
        )));
    }

    // Guarded on the status just read, so a racing change loses cleanly and
    // concurrent reprints each add to the counter
    let ts = now();
    let mut update = id_generate::Entity::update_many()
        .col_expr(id_generate::Column::Status, Expr::value(next.as_str()))
        .col_expr(id_generate::Column::UpdatedAt, Expr::value(ts));
    if next == CardStatus::Printed {
        update = update
            .col_expr(id_generate::Column::PrintedAt, Expr::value(ts))
            .col_expr(
                id_generate::Column::PrintCount,
                Expr::col(id_generate::Column::PrintCount).add(1),
            );
    }
    let result = update
        .filter(id_generate::Column::Id.eq(old.id))
        .filter(id_generate::Column::Status.eq(from.as_str()))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "card {} changed status concurrently, reload and retry",
            old.id
        )));
    }
    let updated = find_card(state, old.id).await?;

    tracing::info!("Card {} status {} -> {} by {}", old.id, from, next, current.email);
    state.audit.record(
        AuditEntry::new(current, AuditAction::StatusChange, TABLE, Some(old.id))
            .with_old(&old)
            .with_new(&updated),
    );

    Ok(updated)
}

/// GET /api/id-cards
pub async fn list_cards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<CardQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<CardResponse>>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::View).await?;

    let mut select = id_generate::Entity::find();
    if let Some(status) = query.status {
        select = select.filter(id_generate::Column::Status.eq(status.as_str()));
    }
    if let Some(employee_id) = query.employee_id {
        select = select.filter(id_generate::Column::EmployeeId.eq(employee_id));
    }
    if let Some(template_id) = query.template_id {
        select = select.filter(id_generate::Column::TemplateId.eq(template_id));
    }

    let total = select.clone().count(&state.db).await?;
    let cards = select
        .order_by_desc(id_generate::Column::Id)
        .offset(page.offset())
        .limit(page.limit())
        .all(&state.db)
        .await?;

    let items = describe(&state, cards).await?;
    Ok(Json(ApiResponse::success(Page::new(items, total, &page))))
}

/// GET /api/id-cards/:id
pub async fn get_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<CardResponse>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::View).await?;

    let card = find_card(&state, id).await?;
    Ok(Json(ApiResponse::success(describe_one(&state, card).await?)))
}

/// POST /api/id-cards
pub async fn create_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateCardRequest>,
) -> AppResult<Json<ApiResponse<CardResponse>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::Add).await?;

    let emp = employee::Entity::find_by_id(req.employee_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("employee {} does not exist", req.employee_id)))?;
    if !emp.is_active {
        return Err(AppError::BadRequest(format!(
            "employee {} is inactive",
            emp.employee_code
        )));
    }
    active_template(&state, req.template_id).await?;

    let issue_date = req.issue_date.unwrap_or_else(today);
    let expiry_date = match req.expiry_date {
        Some(date) => date,
        None => card::default_expiry(issue_date, state.config.card.default_validity_days)?,
    };
    check_dates(issue_date, expiry_date)?;

    let ts = now();
    let created = id_generate::ActiveModel {
        employee_id: Set(emp.id),
        template_id: Set(req.template_id),
        status: Set(CardStatus::Created.as_str().to_string()),
        qr_code: Set(card::qr_token(&emp.employee_code)),
        issue_date: Set(issue_date),
        expiry_date: Set(expiry_date),
        printed_at: Set(None),
        print_count: Set(0),
        created_by: Set(Some(current.id)),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Card {} generated for {} by {}", created.id, emp.employee_code, current.email);
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Create, TABLE, Some(created.id)).with_new(&created),
    );

    Ok(Json(ApiResponse::success(describe_one(&state, created).await?)))
}

/// PUT /api/id-cards/:id
pub async fn update_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCardRequest>,
) -> AppResult<Json<ApiResponse<CardResponse>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::Edit).await?;

    let old = find_card(&state, id).await?;
    if old.card_status() != CardStatus::Created {
        return Err(AppError::BadRequest(format!(
            "card can only be edited while {}, it is {}",
            CardStatus::Created,
            old.status
        )));
    }

    let template_id = match req.template_id {
        Some(template_id) if template_id != old.template_id => {
            active_template(&state, template_id).await?.id
        }
        _ => old.template_id,
    };
    let issue_date = req.issue_date.unwrap_or(old.issue_date);
    let expiry_date = req.expiry_date.unwrap_or(old.expiry_date);
    check_dates(issue_date, expiry_date)?;

    let mut active: id_generate::ActiveModel = old.clone().into();
    active.template_id = Set(template_id);
    active.issue_date = Set(issue_date);
    active.expiry_date = Set(expiry_date);
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;

    state.audit.record(
        AuditEntry::new(&current, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&updated),
    );

    Ok(Json(ApiResponse::success(describe_one(&state, updated).await?)))
}

/// DELETE /api/id-cards/:id
pub async fn delete_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::Delete).await?;

    let old = find_card(&state, id).await?;
    id_generate::Entity::delete_by_id(id).exec(&state.db).await?;

    tracing::info!("Card {} deleted by {}", id, current.email);
    state
        .audit
        .record(AuditEntry::new(&current, AuditAction::Delete, TABLE, Some(id)).with_old(&old));

    Ok(Json(ApiResponse::success_msg("card deleted")))
}

/// PUT /api/id-cards/:id/status
pub async fn update_card_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> AppResult<Json<ApiResponse<CardResponse>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::Edit).await?;

    let old = find_card(&state, id).await?;
    let updated = transition(&state, &current, old, req.status).await?;

    Ok(Json(ApiResponse::success(describe_one(&state, updated).await?)))
}

/// POST /api/id-cards/bulk-status
///
/// Each card is moved on its own; failures are reported, not rolled back
pub async fn bulk_update_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<BulkStatusRequest>,
) -> AppResult<Json<ApiResponse<BulkStatusResponse>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::Edit).await?;

    if req.ids.is_empty() {
        return Err(AppError::Validation("ids must not be empty".to_string()));
    }
    if req.ids.len() > MAX_BULK {
        return Err(AppError::Validation(format!("at most {} ids per request", MAX_BULK)));
    }

    let mut ids = req.ids;
    ids.sort_unstable();
    ids.dedup();

    let mut cards: HashMap<i64, id_generate::Model> = id_generate::Entity::find()
        .filter(id_generate::Column::Id.is_in(ids.clone()))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut result = BulkStatusResponse {
        updated: Vec::new(),
        failed: Vec::new(),
    };
    for id in ids {
        let Some(old) = cards.remove(&id) else {
            result.failed.push(BulkFailure {
                id,
                reason: "card not found".to_string(),
            });
            continue;
        };
        match transition(&state, &current, old, req.status).await {
            Ok(_) => result.updated.push(id),
            Err(AppError::BadRequest(reason)) => result.failed.push(BulkFailure { id, reason }),
            Err(e) => return Err(e),
        }
    }

    Ok(Json(ApiResponse::success(result)))
}

/// GET /api/id-cards/:id/render?scale=
pub async fn render_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Query(query): Query<RenderQuery>,
) -> AppResult<Json<ApiResponse<CardDocument>>> {
    require(&state.db, &current, resource::ID_CARDS, Action::View).await?;

    let card_model = find_card(&state, id).await?;
    let (emp, dept) = employee::Entity::find_by_id(card_model.employee_id)
        .find_also_related(department::Entity)
        .one(&state.db)
        .await?
        .ok_or_not_found("employee not found")?;
    let template = id_card_template::Entity::find_by_id(card_model.template_id)
        .one(&state.db)
        .await?
        .ok_or_not_found("template not found")?;

    let layout = CardLayout::parse(&template.layout)?;
    let frame = TemplateFrame {
        width: template.width,
        height: template.height,
        front_background: template.front_image.as_deref().map(|p| state.upload_url(p)),
        back_background: template.back_image.as_deref().map(|p| state.upload_url(p)),
    };
    let data = CardData {
        name: emp.name,
        employee_code: emp.employee_code,
        designation: emp.designation,
        department: dept.map(|d| d.name),
        category: emp.category,
        section: emp.section,
        phone: emp.phone,
        email: emp.email,
        blood_group: emp.blood_group,
        join_date: emp.join_date,
        issue_date: card_model.issue_date,
        expiry_date: card_model.expiry_date,
        photo_url: emp.photo.as_deref().map(|p| state.upload_url(p)),
        qr_payload: card::qr_payload(&state.config.public_url, &card_model.qr_code),
    };

    let document = card::compose(
        &layout,
        &frame,
        &data,
        query.scale.unwrap_or(1.0),
        &state.config.card.date_format,
    )?;

    Ok(Json(ApiResponse::success(document)))
}

/// GET /api/verify/:qr (public)
pub async fn verify_card(
    State(state): State<AppState>,
    Path(qr): Path<String>,
) -> AppResult<Json<ApiResponse<VerifyResponse>>> {
    let card_model = id_generate::Entity::find()
        .filter(id_generate::Column::QrCode.eq(qr.trim()))
        .one(&state.db)
        .await?
        .ok_or_not_found("unknown card")?;
    let (emp, dept) = employee::Entity::find_by_id(card_model.employee_id)
        .find_also_related(department::Entity)
        .one(&state.db)
        .await?
        .ok_or_not_found("unknown card")?;

    let status = card_model.card_status();
    let reason = card::assess(status, card_model.expiry_date, emp.is_active, today());
    if let Some(reason) = reason {
        tracing::info!("Card {} failed verification: {:?}", card_model.id, reason);
    }

    Ok(Json(ApiResponse::success(VerifyResponse {
        valid: reason.is_none(),
        reason,
        status,
        issue_date: card_model.issue_date,
        expiry_date: card_model.expiry_date,
        employee: VerifiedEmployee {
            photo_url: emp.photo.as_deref().map(|p| state.upload_url(p)),
            name: emp.name,
            employee_code: emp.employee_code,
            designation: emp.designation,
            department: dept.map(|d| d.name),
            blood_group: emp.blood_group,
        },
    })))
}
