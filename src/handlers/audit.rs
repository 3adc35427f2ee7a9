//! Audit log handlers
//!
//! Read-only query endpoints plus the background writer every mutating
//! handler records through

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::entity::audit_log;
use crate::error::{AppResult, OptionExt};
use crate::handlers::{Page, PageQuery};
use crate::middleware::CurrentUser;
use crate::permission::{require, resource, Action};
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Query parameters for log filtering
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub table_name: Option<String>,
    pub record_id: Option<i64>,
    /// Inclusive lower bound, Unix seconds
    pub from: Option<i64>,
    /// Inclusive upper bound, Unix seconds
    pub to: Option<i64>,
}

/// Log response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip: Option<String>,
    pub created_at: i64,
}

fn parse_snapshot(raw: Option<String>) -> Option<serde_json::Value> {
    raw.map(|s| serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)))
}

impl From<audit_log::Model> for LogResponse {
    fn from(m: audit_log::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            username: m.username,
            action: m.action,
            table_name: m.table_name,
            record_id: m.record_id,
            old_values: parse_snapshot(m.old_values),
            new_values: parse_snapshot(m.new_values),
            ip: m.ip,
            created_at: m.created_at,
        }
    }
}

/// GET /api/audit-logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<LogQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<LogResponse>>>> {
    require(&state.db, &user, resource::AUDIT_LOGS, Action::View).await?;

    let mut select = audit_log::Entity::find();
    if let Some(user_id) = query.user_id {
        select = select.filter(audit_log::Column::UserId.eq(user_id));
    }
    if let Some(action) = query.action.as_deref().filter(|a| !a.is_empty()) {
        select = select.filter(audit_log::Column::Action.eq(action.to_uppercase()));
    }
    if let Some(table) = query.table_name.as_deref().filter(|t| !t.is_empty()) {
        select = select.filter(audit_log::Column::TableName.eq(table));
    }
    if let Some(record_id) = query.record_id {
        select = select.filter(audit_log::Column::RecordId.eq(record_id));
    }
    if let Some(from) = query.from {
        select = select.filter(audit_log::Column::CreatedAt.gte(from));
    }
    if let Some(to) = query.to {
        select = select.filter(audit_log::Column::CreatedAt.lte(to));
    }

    let total = select.clone().count(&state.db).await?;
    let logs = select
        .order_by_desc(audit_log::Column::Id)
        .offset(page.offset())
        .limit(page.limit())
        .all(&state.db)
        .await?;

    let items = logs.into_iter().map(LogResponse::from).collect();
    Ok(Json(ApiResponse::success(Page::new(items, total, &page))))
}

/// GET /api/audit-logs/:id
pub async fn get_audit_log(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<LogResponse>>> {
    require(&state.db, &user, resource::AUDIT_LOGS, Action::View).await?;

    let log = audit_log::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("audit log not found")?;

    Ok(Json(ApiResponse::success(log.into())))
}

/// Service for appending audit entries
pub mod service {
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use serde::Serialize;
    use tokio::sync::mpsc;

    use crate::entity::audit_log::{self, AuditAction};
    use crate::middleware::CurrentUser;

    /// Pending entries before new ones are dropped
    const CHANNEL_CAPACITY: usize = 512;

    /// Log entry to be added
    #[derive(Debug, Clone)]
    pub struct AuditEntry {
        pub user_id: Option<i64>,
        pub username: String,
        pub action: AuditAction,
        pub table_name: String,
        pub record_id: Option<i64>,
        pub old_values: Option<String>,
        pub new_values: Option<String>,
        pub ip: Option<String>,
    }

    impl AuditEntry {
        pub fn new(user: &CurrentUser, action: AuditAction, table_name: &str, record_id: Option<i64>) -> Self {
            Self {
                user_id: Some(user.id),
                username: user.email.clone(),
                action,
                table_name: table_name.to_string(),
                record_id,
                old_values: None,
                new_values: None,
                ip: user.ip.clone(),
            }
        }

        /// Entry for a request without an authenticated user (failed login)
        pub fn anonymous(username: &str, action: AuditAction, table_name: &str, ip: Option<String>) -> Self {
            Self {
                user_id: None,
                username: username.to_string(),
                action,
                table_name: table_name.to_string(),
                record_id: None,
                old_values: None,
                new_values: None,
                ip,
            }
        }

        pub fn with_old<T: Serialize>(mut self, value: &T) -> Self {
            self.old_values = serde_json::to_string(value).ok();
            self
        }

        pub fn with_new<T: Serialize>(mut self, value: &T) -> Self {
            self.new_values = serde_json::to_string(value).ok();
            self
        }
    }

    /// Handle to the background writer
    #[derive(Clone)]
    pub struct AuditService {
        tx: mpsc::Sender<AuditEntry>,
    }

    impl AuditService {
        /// Start the writer task on the current runtime
        pub fn spawn(db: DatabaseConnection) -> Self {
            let (tx, mut rx) = mpsc::channel::<AuditEntry>(CHANNEL_CAPACITY);

            tokio::spawn(async move {
                while let Some(entry) = rx.recv().await {
                    let log = audit_log::ActiveModel {
                        user_id: Set(entry.user_id),
                        username: Set(entry.username),
                        action: Set(entry.action.as_str().to_string()),
                        table_name: Set(entry.table_name),
                        record_id: Set(entry.record_id),
                        old_values: Set(entry.old_values),
                        new_values: Set(entry.new_values),
                        ip: Set(entry.ip),
                        created_at: Set(chrono::Utc::now().timestamp()),
                        ..Default::default()
                    };

                    if let Err(e) = log.insert(&db).await {
                        tracing::error!("Failed to write audit log: {}", e);
                    }
                }
            });

            Self { tx }
        }

        /// Queue an entry without waiting for the insert
        pub fn record(&self, entry: AuditEntry) {
            if let Err(e) = self.tx.try_send(entry) {
                tracing::warn!("Audit channel unavailable, entry dropped: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::service::AuditEntry;
    use super::*;
    use crate::entity::audit_log::AuditAction;

    fn actor() -> CurrentUser {
        CurrentUser {
            id: 3,
            name: "HR Officer".to_string(),
            email: "hr@example.com".to_string(),
            role_id: 2,
            role_name: "hr".to_string(),
            ip: Some("10.1.1.1".to_string()),
        }
    }

    #[test]
    fn test_entry_snapshots() {
        let entry = AuditEntry::new(&actor(), AuditAction::Update, "employee", Some(9))
            .with_old(&serde_json::json!({"name": "A"}))
            .with_new(&serde_json::json!({"name": "B"}));
        assert_eq!(entry.user_id, Some(3));
        assert_eq!(entry.username, "hr@example.com");
        assert_eq!(entry.old_values.as_deref(), Some(r#"{"name":"A"}"#));
        assert_eq!(entry.ip.as_deref(), Some("10.1.1.1"));
    }

    #[test]
    fn test_log_response_parses_snapshots() {
        let model = audit_log::Model {
            id: 1,
            user_id: None,
            username: "x@example.com".to_string(),
            action: "LOGIN_FAILED".to_string(),
            table_name: "app_user".to_string(),
            record_id: None,
            old_values: None,
            new_values: Some(r#"{"id":4}"#.to_string()),
            ip: None,
            created_at: 0,
        };
        let response = LogResponse::from(model);
        assert_eq!(response.new_values, Some(serde_json::json!({"id": 4})));
        assert!(response.old_values.is_none());
    }
}
