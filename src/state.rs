use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::handlers::audit::service::AuditService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Audit log writer
    pub audit: AuditService,
}

impl AppState {
    /// Create new application state and start the audit writer
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let audit = AuditService::spawn(db.clone());

        Self {
            db,
            config: Arc::new(config),
            audit,
        }
    }

    /// Public URL of a stored upload, e.g. `/uploads/templates/x.png`
    pub fn upload_url(&self, relative: &str) -> String {
        format!("/uploads/{}", relative.trim_start_matches('/'))
    }
}
