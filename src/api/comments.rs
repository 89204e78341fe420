//! Comment API endpoints
//!
//! Comments are nested under their post:
//! - GET /api/posts/{id}/comments
//! - POST /api/posts/{id}/comments
//! - GET/PUT/DELETE /api/posts/{id}/comments/{comment_id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::check_body_id;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::CommentResponse;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub post_id: Option<i64>,
    pub text: String,
}

/// Build the comment router, mounted next to the post routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/comments", get(list_comments).post(create_comment))
        .route(
            "/{id}/comments/{comment_id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let comments = state.comment_service.list(post_id).await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment = state.comment_service.create(post_id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

async fn get_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state.comment_service.get(post_id, comment_id).await?;
    Ok(Json(comment.into()))
}

async fn update_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    check_body_id(comment_id, body.id, "Comment")?;
    check_body_id(post_id, body.post_id, "Post")?;

    let comment = state
        .comment_service
        .update(post_id, comment_id, &body.text)
        .await?;
    Ok(Json(comment.into()))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(post_id, comment_id).await?;
    Ok(StatusCode::OK)
}
