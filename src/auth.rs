//! Access tokens and password hashing

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

/// JWT claims carried by every dashboard request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    /// Role id at issuance
    pub role: i64,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, email: impl Into<String>, role_id: i64, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email: email.into(),
            role: role_id,
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
        }
    }
}

/// Sign claims with the configured secret
pub fn issue_token(config: &AuthConfig, claims: &Claims) -> AppResult<String> {
    if config.jwt_secret.is_empty() {
        return Err(AppError::Internal("JWT secret not configured".to_string()));
    }
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), claims, &key)
        .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))
}

/// Verify signature and expiry, returning the claims
pub fn decode_token(config: &AuthConfig, token: &str) -> AppResult<Claims> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    decode::<Claims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))
}

pub fn hash_password(config: &AuthConfig, password: &str) -> AppResult<String> {
    bcrypt::hash(password, config.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
            bcrypt_cost: 4,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let config = test_config();
        let claims = Claims::new(7, "hr@example.com", 2, config.token_ttl_hours);
        let token = issue_token(&config, &claims).unwrap();
        let decoded = decode_token(&config, &token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_token_wrong_secret() {
        let config = test_config();
        let token = issue_token(&config, &Claims::new(1, "a@b.c", 1, 1)).unwrap();
        let other = AuthConfig {
            jwt_secret: "other".to_string(),
            ..test_config()
        };
        assert!(matches!(decode_token(&other, &token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token() {
        let config = test_config();
        let token = issue_token(&config, &Claims::new(1, "a@b.c", 1, -2)).unwrap();
        assert!(decode_token(&config, &token).is_err());
    }

    #[test]
    fn test_password_hash() {
        let config = test_config();
        let hash = hash_password(&config, "s3cret").unwrap();
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
    }
}
