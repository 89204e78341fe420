//! Common API utilities and shared types

use serde::Deserialize;

use crate::api::middleware::ApiError;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size
pub fn default_page_size() -> u32 {
    10
}

/// Query parameters of the post search endpoint
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
    /// One-based page number
    #[serde(default = "default_page")]
    pub page_number: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl SearchQuery {
    /// Check the request and return the zero-based page number.
    pub fn validate(&self) -> Result<u32, ApiError> {
        if self.search.trim().is_empty() {
            return Err(ApiError::validation_error("Search query cannot be empty"));
        }
        if self.page_number < 1 {
            return Err(ApiError::validation_error("page_number must be at least 1"));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(ApiError::validation_error(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(self.page_number - 1)
    }
}

/// Reject a body id that disagrees with the path id
pub fn check_body_id(path_id: i64, body_id: Option<i64>, what: &str) -> Result<(), ApiError> {
    match body_id {
        Some(id) if id != path_id => Err(ApiError::validation_error(format!(
            "{} id in body ({}) does not match path ({})",
            what, id, path_id
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(search: &str, page_number: u32, page_size: u32) -> SearchQuery {
        SearchQuery {
            search: search.to_string(),
            page_number,
            page_size,
        }
    }

    #[test]
    fn test_page_number_converted_to_zero_based() {
        assert_eq!(query("a", 1, 10).validate().unwrap(), 0);
        assert_eq!(query("a", 3, 10).validate().unwrap(), 2);
    }

    #[test]
    fn test_invalid_queries() {
        assert!(query("  ", 1, 10).validate().is_err());
        assert!(query("a", 0, 10).validate().is_err());
        assert!(query("a", 1, 0).validate().is_err());
        assert!(query("a", 1, MAX_PAGE_SIZE + 1).validate().is_err());
        assert!(query("a", 1, MAX_PAGE_SIZE).validate().is_ok());
    }

    #[test]
    fn test_check_body_id() {
        assert!(check_body_id(1, None, "Post").is_ok());
        assert!(check_body_id(1, Some(1), "Post").is_ok());
        let err = check_body_id(1, Some(2), "Post").unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }
}
