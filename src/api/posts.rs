//! Post API endpoints
//!
//! Handles HTTP requests for posts:
//! - GET /api/posts - Search posts (`search`, one-based `page_number`, `page_size`)
//! - POST /api/posts - Create post
//! - GET /api/posts/{id} - Get post
//! - PUT /api/posts/{id} - Update post
//! - DELETE /api/posts/{id} - Delete post
//! - POST /api/posts/{id}/likes - Like post
//! - PUT /api/posts/{id}/image - Upload post image (multipart field `image`)
//! - GET /api/posts/{id}/image - Download post image

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{check_body_id, SearchQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ImageUploadResponse, PostPageResponse, PostResponse};
use crate::models::{CreatePostInput, UpdatePostInput};

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

/// Room for multipart framing on top of the image itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Request body for creating a post
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for updating a post
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    /// Optional; must match the path id when present
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Build the post router
pub fn router(state: &AppState) -> Router<AppState> {
    let body_limit = usize::try_from(state.max_image_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(search_posts).post(create_post))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/{id}/likes", post(like_post))
        .route(
            "/{id}/image",
            get(get_image)
                .put(upload_image)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// GET /api/posts - Search posts
async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PostPageResponse>, ApiError> {
    let page_number = query.validate()?;

    let page = state
        .post_service
        .search(&query.search, page_number, query.page_size)
        .await?;

    Ok(Json(page.into()))
}

/// POST /api/posts - Create post
async fn create_post(
    State(state): State<AppState>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let input = CreatePostInput::new(body.title, body.text).with_tags(body.tags);
    let post = state.post_service.create(input).await?;

    Ok((StatusCode::CREATED, Json(post.into())))
}

/// GET /api/posts/{id} - Get post
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state.post_service.get(id).await?;
    Ok(Json(post.into()))
}

/// PUT /api/posts/{id} - Update post
async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    check_body_id(id, body.id, "Post")?;

    let input = UpdatePostInput::new(body.title, body.text).with_tags(body.tags);
    let post = state.post_service.update(id, input).await?;

    Ok(Json(post.into()))
}

/// DELETE /api/posts/{id} - Delete post
async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id).await?;
    Ok(StatusCode::OK)
}

/// POST /api/posts/{id}/likes - Like post, returning the new count
async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<i64>, ApiError> {
    let likes = state.post_service.like(id).await?;
    Ok(Json(likes))
}

/// PUT /api/posts/{id}/image - Upload post image
async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read image: {}", e)))?;

        let size = data.len() as u64;
        if size > state.max_image_size {
            return Err(ApiError::validation_error(format!(
                "Image too large: {} bytes (maximum {} bytes)",
                size, state.max_image_size
            )));
        }

        let image_path = state
            .post_service
            .update_image(id, file_name.as_deref(), &data)
            .await?;

        return Ok(Json(ImageUploadResponse { image_path }));
    }

    Err(ApiError::validation_error(format!(
        "Missing multipart field: {}",
        IMAGE_FIELD
    )))
}

/// GET /api/posts/{id}/image - Download post image
async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let image = state.post_service.image(id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "no-store"),
        ],
        image.data,
    )
        .into_response())
}
