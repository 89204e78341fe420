//! API middleware
//!
//! Contains:
//! - Shared application state handed to every handler
//! - `ApiError`, the JSON error body and its status mapping
//! - Conversions from service errors to `ApiError`

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::services::{
    CommentService, CommentServiceError, PostService, PostServiceError, StorageError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    /// Largest accepted image upload in bytes
    pub max_image_size: u64,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Empty | StorageError::TooLarge { .. } => {
                ApiError::validation_error(e.to_string())
            }
            StorageError::NotFound(_) => ApiError::not_found(e.to_string()),
            StorageError::InvalidPath(_) | StorageError::Io(_) => {
                tracing::error!(error = %e, "Image storage failure");
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(id) => {
                ApiError::not_found(format!("Post not found: {}", id))
            }
            PostServiceError::ImageNotFound(id) => {
                ApiError::not_found(format!("Image not found for post: {}", id))
            }
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PostServiceError::DuplicateTitle(title) => ApiError::with_details(
                "CONFLICT",
                format!("Post title already exists: {}", title),
                serde_json::json!({"field": "title", "value": title}),
            ),
            PostServiceError::Storage(e) => e.into(),
            PostServiceError::InternalError(e) => {
                tracing::error!(error = %format!("{:#}", e), "Post operation failed");
                ApiError::internal_error(e.to_string())
            }
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::PostNotFound(id) => {
                ApiError::not_found(format!("Post not found: {}", id))
            }
            CommentServiceError::NotFound(id) => {
                ApiError::not_found(format!("Comment not found: {}", id))
            }
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::InternalError(e) => {
                tracing::error!(error = %format!("{:#}", e), "Comment operation failed");
                ApiError::internal_error(e.to_string())
            }
        }
    }
}
