//! Shared harness: in-memory sqlite, seeded data and request helpers
#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tower::ServiceExt;

use idcard_hub::entity::audit_log;
use idcard_hub::{bootstrap, db, routes, AppState, Config};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin123";

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.database.db_type = "sqlite".to_string();
    config.database.url = Some("sqlite::memory:".to_string());
    config.auth.jwt_secret = "test-secret-key-for-tests".to_string();
    config.auth.bcrypt_cost = 4;
    config.public_url = "http://cards.test".to_string();
    config.upload_dir = std::env::temp_dir().join(format!("idcard-hub-test-{}", uuid::Uuid::new_v4()));
    config.bootstrap.admin_email = ADMIN_EMAIL.to_string();
    config.bootstrap.admin_password = ADMIN_PASSWORD.to_string();
    config
}

/// Build the router exactly like main.rs, without binding a socket
pub async fn setup() -> TestApp {
    let config = test_config();
    let upload_dir = config.upload_dir.clone();
    std::fs::create_dir_all(&upload_dir).unwrap();

    let database_conn = db::init_database(&config.database).await.unwrap();
    bootstrap::run(&database_conn, &config).await.unwrap();

    let state = AppState::new(database_conn.clone(), config);
    TestApp {
        router: routes::create_router(state),
        db: database_conn,
        upload_dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call("DELETE", uri, Some(token), None).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn create_department(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self.post("/api/departments", token, json!({ "name": name })).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn create_employee(&self, token: &str, code: &str, department_id: i64) -> i64 {
        let (status, body) = self
            .post(
                "/api/employees",
                token,
                json!({
                    "employeeCode": code,
                    "name": format!("Employee {}", code),
                    "designation": "Engineer",
                    "departmentId": department_id,
                    "bloodGroup": "O+",
                    "joinDate": "2024-03-01"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    /// Role plus an active user holding it; returns (role id, token)
    pub async fn create_user_with_role(&self, admin: &str, role_name: &str, email: &str) -> (i64, String) {
        let (status, body) = self.post("/api/roles", admin, json!({ "name": role_name })).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let role_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = self
            .post(
                "/api/users",
                admin,
                json!({ "name": role_name, "email": email, "password": "secret99", "roleId": role_id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        (role_id, self.login(email, "secret99").await)
    }

    /// Menu id of a sub-menu path and the sub-menu id
    pub async fn sub_menu_ids(&self, admin: &str, path: &str) -> (i64, i64) {
        let (_, body) = self.get("/api/menus", admin).await;
        for m in body["data"].as_array().unwrap() {
            for s in m["subMenus"].as_array().unwrap() {
                if s["path"] == path {
                    return (m["id"].as_i64().unwrap(), s["id"].as_i64().unwrap());
                }
            }
        }
        panic!("sub-menu {} not seeded", path);
    }

    /// Audit rows are written by a background task; poll until they land
    pub async fn wait_for_audit(&self, action: &str, table: &str, at_least: u64) -> u64 {
        let mut count = 0;
        for _ in 0..50 {
            count = audit_log::Entity::find()
                .filter(audit_log::Column::Action.eq(action))
                .filter(audit_log::Column::TableName.eq(table))
                .count(&self.db)
                .await
                .unwrap();
            if count >= at_least {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        count
    }
}

/// Hand-built multipart body
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----idcardhubtestboundary".to_string(),
            bytes: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        let part = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            self.boundary, name, value
        );
        self.bytes.extend_from_slice(part.as_bytes());
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        let header = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.boundary, name, file_name, content_type
        );
        self.bytes.extend_from_slice(header.as_bytes());
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, method: &str, uri: &str, token: &str) -> Request<Body> {
        self.bytes
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.bytes))
            .unwrap()
    }
}
