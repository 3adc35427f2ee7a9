//! ID card template handlers
//!
//! Templates are submitted as multipart forms: text fields plus optional
//! front/back background images.

use axum::{
    extract::{Multipart, Path, State},
    response::Json,
    Extension,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;

use crate::card::CardLayout;
use crate::entity::audit_log::AuditAction;
use crate::entity::{id_card_template, id_generate};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditEntry;
use crate::handlers::{check_length, now};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::storage::{self, FormData, TEMPLATE_FOLDER};

const TABLE: &str = "id_card_template";
const MAX_DIMENSION: i32 = 4000;

/// Template with parsed layout and image URLs
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub id: i64,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub front_image: Option<String>,
    pub back_image: Option<String>,
    pub front_image_url: Option<String>,
    pub back_image_url: Option<String>,
    pub layout: CardLayout,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TemplateResponse {
    pub fn new(state: &AppState, m: id_card_template::Model) -> AppResult<Self> {
        Ok(Self {
            layout: CardLayout::parse(&m.layout)?,
            front_image_url: m.front_image.as_deref().map(|p| state.upload_url(p)),
            back_image_url: m.back_image.as_deref().map(|p| state.upload_url(p)),
            id: m.id,
            name: m.name,
            width: m.width,
            height: m.height,
            front_image: m.front_image,
            back_image: m.back_image,
            is_active: m.is_active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

/// Scalar form fields; None means "not submitted"
struct TemplateFields {
    name: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    is_active: Option<bool>,
    layout: Option<CardLayout>,
}

impl TemplateFields {
    fn from_form(form: &FormData) -> AppResult<Self> {
        let name = form
            .text("name")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(name) = &name {
            check_length(name, "name", 64)?;
        }

        let width = form.parse::<i32>("width")?;
        let height = form.parse::<i32>("height")?;
        for (field, value) in [("width", width), ("height", height)] {
            if let Some(v) = value {
                if v <= 0 || v > MAX_DIMENSION {
                    return Err(AppError::Validation(format!(
                        "{} must be between 1 and {}",
                        field, MAX_DIMENSION
                    )));
                }
            }
        }

        let layout = form.text("layout").map(CardLayout::parse).transpose()?;

        Ok(Self {
            name,
            width,
            height,
            is_active: form.parse::<bool>("isActive")?,
            layout,
        })
    }
}

/// Saved images of one request; removed again if the write fails
struct SavedImages {
    front: Option<String>,
    back: Option<String>,
}

impl SavedImages {
    async fn save(state: &AppState, form: &mut FormData) -> AppResult<Self> {
        let front_file = form.take_file("frontImage");
        let back_file = form.take_file("backImage");
        // Reject bad types before anything touches the disk
        for file in front_file.iter().chain(back_file.iter()) {
            storage::image_extension(file)?;
        }

        let dir = &state.config.upload_dir;
        let front = match &front_file {
            Some(file) => Some(storage::save_image(dir, TEMPLATE_FOLDER, file).await?),
            None => None,
        };
        let back = match &back_file {
            Some(file) => match storage::save_image(dir, TEMPLATE_FOLDER, file).await {
                Ok(path) => Some(path),
                Err(e) => {
                    if let Some(front) = &front {
                        storage::remove_file(dir, front).await;
                    }
                    return Err(e);
                }
            },
            None => None,
        };
        Ok(Self { front, back })
    }

    async fn discard(&self, state: &AppState) {
        for path in self.front.iter().chain(self.back.iter()) {
            storage::remove_file(&state.config.upload_dir, path).await;
        }
    }
}

/// GET /api/id-card-templates
pub async fn list_templates(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<TemplateResponse>>>> {
    require(&state.db, &current, resource::ID_CARD_TEMPLATES, Action::View).await?;

    let templates = id_card_template::Entity::find()
        .order_by_asc(id_card_template::Column::Name)
        .all(&state.db)
        .await?;

    let items = templates
        .into_iter()
        .map(|t| TemplateResponse::new(&state, t))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/id-card-templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<TemplateResponse>>> {
    require(&state.db, &current, resource::ID_CARD_TEMPLATES, Action::View).await?;

    let template = id_card_template::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("template not found")?;

    Ok(Json(ApiResponse::success(TemplateResponse::new(&state, template)?)))
}

/// POST /api/id-card-templates (multipart)
pub async fn create_template(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<TemplateResponse>>> {
    require(&state.db, &current, resource::ID_CARD_TEMPLATES, Action::Add).await?;

    let mut form = FormData::read(&mut multipart).await?;
    let fields = TemplateFields::from_form(&form)?;
    let name = fields
        .name
        .ok_or_else(|| AppError::Validation("name is required".to_string()))?;
    let width = fields
        .width
        .ok_or_else(|| AppError::Validation("width is required".to_string()))?;
    let height = fields
        .height
        .ok_or_else(|| AppError::Validation("height is required".to_string()))?;
    let layout = fields.layout.unwrap_or_default();
    layout.validate(width, height)?;

    let images = SavedImages::save(&state, &mut form).await?;

    let ts = now();
    let inserted = id_card_template::ActiveModel {
        name: Set(name),
        width: Set(width),
        height: Set(height),
        front_image: Set(images.front.clone()),
        back_image: Set(images.back.clone()),
        layout: Set(layout.to_json()?),
        is_active: Set(fields.is_active.unwrap_or(true)),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    let created = match inserted {
        Ok(created) => created,
        Err(e) => {
            images.discard(&state).await;
            return Err(e.into());
        }
    };

    tracing::info!("Template created: {} by {}", created.name, current.email);
    state.audit.record(
        AuditEntry::new(&current, AuditAction::Create, TABLE, Some(created.id)).with_new(&created),
    );

    Ok(Json(ApiResponse::success(TemplateResponse::new(&state, created)?)))
}

/// PUT /api/id-card-templates/:id (multipart)
///
/// Omitted fields keep their value; an uploaded image replaces the old file
pub async fn update_template(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<TemplateResponse>>> {
    require(&state.db, &current, resource::ID_CARD_TEMPLATES, Action::Edit).await?;

    let old = id_card_template::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("template not found")?;

    let mut form = FormData::read(&mut multipart).await?;
    let fields = TemplateFields::from_form(&form)?;
    let width = fields.width.unwrap_or(old.width);
    let height = fields.height.unwrap_or(old.height);
    let layout = match fields.layout {
        Some(layout) => layout,
        None => CardLayout::parse(&old.layout)?,
    };
    // Shrinking the template re-checks the stored layout too
    layout.validate(width, height)?;

    let images = SavedImages::save(&state, &mut form).await?;

    let mut active: id_card_template::ActiveModel = old.clone().into();
    if let Some(name) = fields.name {
        active.name = Set(name);
    }
    active.width = Set(width);
    active.height = Set(height);
    active.layout = Set(layout.to_json()?);
    if let Some(is_active) = fields.is_active {
        active.is_active = Set(is_active);
    }
    if images.front.is_some() {
        active.front_image = Set(images.front.clone());
    }
    if images.back.is_some() {
        active.back_image = Set(images.back.clone());
    }
    active.updated_at = Set(now());

    let updated = match active.update(&state.db).await {
        Ok(updated) => updated,
        Err(e) => {
            images.discard(&state).await;
            return Err(e.into());
        }
    };

    let replaced = [
        (images.front.is_some(), &old.front_image),
        (images.back.is_some(), &old.back_image),
    ];
    for (was_replaced, previous) in replaced {
        if let (true, Some(previous)) = (was_replaced, previous) {
            storage::remove_file(&state.config.upload_dir, previous).await;
        }
    }

    state.audit.record(
        AuditEntry::new(&current, AuditAction::Update, TABLE, Some(id))
            .with_old(&old)
            .with_new(&updated),
    );

    Ok(Json(ApiResponse::success(TemplateResponse::new(&state, updated)?)))
}

/// DELETE /api/id-card-templates/:id
pub async fn delete_template(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require(&state.db, &current, resource::ID_CARD_TEMPLATES, Action::Delete).await?;

    let old = id_card_template::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("template not found")?;

    let cards = id_generate::Entity::find()
        .filter(id_generate::Column::TemplateId.eq(id))
        .count(&state.db)
        .await?;
    if cards > 0 {
        return Err(AppError::Conflict(format!(
            "template '{}' is used by {} card(s)",
            old.name, cards
        )));
    }

    id_card_template::Entity::delete_by_id(id).exec(&state.db).await?;

    for path in old.front_image.iter().chain(old.back_image.iter()) {
        storage::remove_file(&state.config.upload_dir, path).await;
    }

    tracing::info!("Template deleted: {} by {}", old.name, current.email);
    state
        .audit
        .record(AuditEntry::new(&current, AuditAction::Delete, TABLE, Some(id)).with_old(&old));

    Ok(Json(ApiResponse::success_msg("template deleted")))
}
