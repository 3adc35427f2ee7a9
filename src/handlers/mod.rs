//! Request handlers module

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub mod audit;
pub mod auth;
pub mod department;
pub mod department_transfer;
pub mod employee;
pub mod id_card_template;
pub mod id_generate;
pub mod menu;
pub mod role;
pub mod role_permission;
pub mod user;

/// Query parameters for pagination
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(rename = "pageSize", default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageQuery {
    pub fn limit(&self) -> u64 {
        self.page_size.clamp(1, 100)
    }

    /// Row offset, capped to what a signed SQL bind can carry
    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1)
            .saturating_mul(self.limit())
            .min(i64::MAX as u64)
    }
}

/// One page of results
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: u64, query: &PageQuery) -> Self {
        Self {
            items,
            total,
            page: query.page.max(1),
            page_size: query.limit(),
        }
    }
}

/// Reject a blank required field
pub fn require_text(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Reject a value longer than `max` characters
pub fn check_length(value: &str, field: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} must not exceed {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Trim an optional field, mapping blank to None
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Current Unix timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let q = PageQuery { page: 0, page_size: 500 };
        assert_eq!(q.limit(), 100);
        assert_eq!(q.offset(), 0);

        let q = PageQuery { page: 3, page_size: 10 };
        assert_eq!(q.offset(), 20);

        let q = PageQuery { page: u64::MAX, page_size: 100 };
        assert_eq!(q.offset(), i64::MAX as u64);
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("Finance", "name").is_ok());
        assert!(matches!(require_text("  ", "name"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  HR ".to_string())), Some("HR".to_string()));
        assert_eq!(normalize_optional(Some("   ".to_string())), None);
        assert_eq!(normalize_optional(None), None);
    }

    #[test]
    fn test_check_length() {
        assert!(check_length("abc", "code", 3).is_ok());
        assert!(check_length("abcd", "code", 3).is_err());
    }
}
