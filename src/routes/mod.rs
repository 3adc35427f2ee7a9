use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

pub mod health;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Multipart routes get the configured upload limit
    let max_upload = state.config.max_upload_size;

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/change-password", post(handlers::auth::change_password))
        // Public card verification
        .route("/verify/:qr", get(handlers::id_generate::verify_card))
        // Permission routes
        .route("/permissions/check", get(handlers::role_permission::check_permission))
        // User routes
        .route(
            "/users",
            get(handlers::user::list_users).post(handlers::user::create_user),
        )
        .route(
            "/users/:id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        // Role routes
        .route(
            "/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/roles/:id",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        .route(
            "/roles/:id/permissions",
            get(handlers::role_permission::get_role_permissions)
                .put(handlers::role_permission::replace_role_permissions),
        )
        // Menu routes
        .route(
            "/menus",
            get(handlers::menu::list_menus).post(handlers::menu::create_menu),
        )
        .route("/menus/mine", get(handlers::menu::my_menus))
        .route(
            "/menus/:id",
            get(handlers::menu::get_menu)
                .put(handlers::menu::update_menu)
                .delete(handlers::menu::delete_menu),
        )
        // Department routes
        .route(
            "/departments",
            get(handlers::department::list_departments).post(handlers::department::create_department),
        )
        .route(
            "/departments/:id",
            get(handlers::department::get_department)
                .put(handlers::department::update_department)
                .delete(handlers::department::delete_department),
        )
        // Employee routes
        .route(
            "/employees",
            get(handlers::employee::list_employees).post(handlers::employee::create_employee),
        )
        .route(
            "/employees/:id",
            get(handlers::employee::get_employee)
                .put(handlers::employee::update_employee)
                .delete(handlers::employee::delete_employee),
        )
        .route(
            "/employees/:id/photo",
            post(handlers::employee::upload_photo).layer(DefaultBodyLimit::max(max_upload)),
        )
        // Department transfer routes
        .route(
            "/department-transfers",
            get(handlers::department_transfer::list_transfers)
                .post(handlers::department_transfer::create_transfer),
        )
        .route(
            "/department-transfers/:id",
            get(handlers::department_transfer::get_transfer),
        )
        // ID card template routes
        .route(
            "/id-card-templates",
            get(handlers::id_card_template::list_templates)
                .post(handlers::id_card_template::create_template)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .route(
            "/id-card-templates/:id",
            get(handlers::id_card_template::get_template)
                .put(handlers::id_card_template::update_template)
                .delete(handlers::id_card_template::delete_template)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        // Generated card routes
        .route(
            "/id-cards",
            get(handlers::id_generate::list_cards).post(handlers::id_generate::create_card),
        )
        .route("/id-cards/bulk-status", post(handlers::id_generate::bulk_update_status))
        .route(
            "/id-cards/:id",
            get(handlers::id_generate::get_card)
                .put(handlers::id_generate::update_card)
                .delete(handlers::id_generate::delete_card),
        )
        .route("/id-cards/:id/status", put(handlers::id_generate::update_card_status))
        .route("/id-cards/:id/render", get(handlers::id_generate::render_card))
        // Audit log routes
        .route("/audit-logs", get(handlers::audit::list_audit_logs))
        .route("/audit-logs/:id", get(handlers::audit::get_audit_log))
        .fallback(fallback);

    // Uploaded template backgrounds and employee photos
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", uploads)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("Not Found")))
}
