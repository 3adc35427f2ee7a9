//! Authentication middleware
//!
//! Validates bearer tokens for API routes and injects the acting user

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use sea_orm::EntityTrait;

use crate::auth::decode_token;
use crate::entity::{role, user};
use crate::error::AppError;
use crate::state::AppState;

/// Extension to store current user in request
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role_id: i64,
    pub role_name: String,
    /// Client address as reported by the proxy
    pub ip: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role_name == role::ADMIN_ROLE
    }
}

/// Paths that don't require authentication
fn is_public_path(path: &str) -> bool {
    // Uploaded images and anything outside the API are public
    if !path.starts_with("/api") {
        return true;
    }

    path == "/api/auth/login" || path == "/api/health" || path.starts_with("/api/verify/")
}

/// Client IP from proxy headers
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_public_path(&path) {
        return next.run(request).await;
    }

    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return AppError::Unauthorized("missing bearer token".to_string()).into_response();
    };

    let claims = match decode_token(&state.config.auth, bearer.token()) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("Rejected token on {}: {}", path, e);
            return e.into_response();
        }
    };

    let found = user::Entity::find_by_id(claims.sub)
        .find_also_related(role::Entity)
        .one(&state.db)
        .await;

    match found {
        Ok(Some((user_model, role_model))) => {
            if !user_model.is_active {
                return AppError::Unauthorized("account is disabled".to_string()).into_response();
            }

            let current_user = CurrentUser {
                id: user_model.id,
                name: user_model.name,
                email: user_model.email,
                role_id: user_model.role_id,
                role_name: role_model.map(|r| r.name).unwrap_or_default(),
                ip: client_ip(request.headers()),
            };

            request.extensions_mut().insert(current_user);

            next.run(request).await
        }
        Ok(None) => {
            tracing::warn!("Token for unknown user id {}", claims.sub);
            AppError::Unauthorized("invalid session".to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("Database error during auth: {}", e);
            AppError::Database(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/api/auth/login"));
        assert!(is_public_path("/api/verify/abc123"));
        assert!(is_public_path("/uploads/templates/a.png"));
        assert!(!is_public_path("/api/employees"));
        assert!(!is_public_path("/api/auth/me"));
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.9"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("192.168.1.4, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("192.168.1.4"));
    }
}
