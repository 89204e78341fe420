//! Post service
//!
//! Implements business logic for posts:
//! - Search with `#tag` filters and pagination
//! - Create, read, update, delete with validation
//! - Likes and images
//! - Single-post cache invalidation

use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::Context;

use crate::cache::MemoryCache;
use crate::db::repositories::{PostRepository, SearchRepository};
use crate::models::{normalize_tags, CreatePostInput, Post, PostPage, UpdatePostInput};
use crate::search::{excerpt, tokenize, Criteria, PageMeta};
use crate::services::storage::{ImageStorage, StorageError};

/// Cache key prefix for single posts
pub(crate) const CACHE_KEY_POST_BY_ID: &str = "post:id:";

pub(crate) fn post_cache_key(id: i64) -> String {
    format!("{}{}", CACHE_KEY_POST_BY_ID, id)
}

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Post has no stored image, or its file is gone
    #[error("Image not found for post: {0}")]
    ImageNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Another post already uses the title
    #[error("Post title already exists: {0}")]
    DuplicateTitle(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A stored image and its content type
#[derive(Debug, Clone)]
pub struct PostImage {
    pub data: Vec<u8>,
    pub content_type: &'static str,
}

/// Post service
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    search_repo: Arc<dyn SearchRepository>,
    cache: Arc<MemoryCache>,
    storage: Arc<ImageStorage>,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        search_repo: Arc<dyn SearchRepository>,
        cache: Arc<MemoryCache>,
        storage: Arc<ImageStorage>,
    ) -> Self {
        Self {
            repo,
            search_repo,
            cache,
            storage,
        }
    }

    /// Search posts by title phrase and `#tag` tokens.
    ///
    /// `page_number` is zero-based. Posts come back ordered by id with
    /// their full tag sets and bodies cut to an excerpt.
    ///
    /// # Errors
    /// - `ValidationError` if `page_size` is zero
    /// - `InternalError` if any store round trip fails
    pub async fn search(
        &self,
        query: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<PostPage, PostServiceError> {
        let page_size = NonZeroU32::new(page_size).ok_or_else(|| {
            PostServiceError::ValidationError("Page size must be greater than zero".to_string())
        })?;
        let criteria = Criteria::new(tokenize(query), page_number, page_size);

        let page = self
            .search_repo
            .find_page(&criteria)
            .await
            .context("Failed to search posts")?;

        let posts = page
            .posts
            .into_iter()
            .map(|mut post| {
                post.text = excerpt(post.text);
                post
            })
            .collect();

        Ok(PostPage {
            posts,
            meta: PageMeta::compute(page.total, page_size, page_number),
        })
    }

    /// Create a new post
    ///
    /// # Errors
    /// - `ValidationError` if title or text is blank
    /// - `DuplicateTitle` if the title is taken
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        validate_post(&input.title, &input.text)?;

        if self
            .repo
            .exists_by_title(&input.title, None)
            .await
            .context("Failed to check title uniqueness")?
        {
            return Err(PostServiceError::DuplicateTitle(input.title));
        }

        let tags = normalize_tags(&input.tags);
        let post = self
            .repo
            .create(&input.title, &input.text, &tags)
            .await
            .context("Failed to create post")?;

        tracing::info!(post_id = post.id, tags = post.tags.len(), "Post created");
        Ok(post)
    }

    /// Get a post with its full body and tags
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        let cache_key = post_cache_key(id);
        if let Some(post) = self.cache.get::<Post>(&cache_key).await.ok().flatten() {
            return Ok(post);
        }

        let post = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get post by ID")?
            .ok_or(PostServiceError::NotFound(id))?;

        if let Err(e) = self.cache.set(&cache_key, &post).await {
            tracing::warn!(post_id = id, error = %e, "Failed to cache post");
        }

        Ok(post)
    }

    /// Replace a post's title, body and tag set
    ///
    /// # Errors
    /// - `ValidationError` if title or text is blank
    /// - `DuplicateTitle` if another post uses the title
    /// - `NotFound` if the post does not exist
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        validate_post(&input.title, &input.text)?;

        if self
            .repo
            .exists_by_title(&input.title, Some(id))
            .await
            .context("Failed to check title uniqueness")?
        {
            return Err(PostServiceError::DuplicateTitle(input.title));
        }

        let tags = normalize_tags(&input.tags);
        let post = self
            .repo
            .update(id, &input.title, &input.text, &tags)
            .await
            .context("Failed to update post")?
            .ok_or(PostServiceError::NotFound(id))?;

        self.invalidate(id).await;
        tracing::info!(post_id = id, "Post updated");
        Ok(post)
    }

    /// Delete a post with its comments, tag links and image folder
    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(id));
        }

        self.invalidate(id).await;
        if let Err(e) = self.storage.delete_post_dir(id).await {
            tracing::warn!(post_id = id, error = %e, "Failed to remove post images");
        }

        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Add a like and return the new count
    pub async fn like(&self, id: i64) -> Result<i64, PostServiceError> {
        let likes = self
            .repo
            .increment_likes(id)
            .await
            .context("Failed to like post")?
            .ok_or(PostServiceError::NotFound(id))?;

        self.invalidate(id).await;
        Ok(likes)
    }

    /// Replace the post's image. The new file is stored and recorded first;
    /// the previous file is removed only after that succeeds.
    pub async fn update_image(
        &self,
        id: i64,
        file_name: Option<&str>,
        data: &[u8],
    ) -> Result<String, PostServiceError> {
        let post = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get post by ID")?
            .ok_or(PostServiceError::NotFound(id))?;

        let path = self.storage.store(id, file_name, data).await?;
        let recorded = self
            .repo
            .set_image_path(id, Some(&path))
            .await
            .context("Failed to record image path");
        match recorded {
            Ok(true) => {}
            Ok(false) => {
                self.discard_image(id, &path).await;
                return Err(PostServiceError::NotFound(id));
            }
            Err(e) => {
                self.discard_image(id, &path).await;
                return Err(e.into());
            }
        }

        self.invalidate(id).await;

        if let Some(old) = post
            .image_path
            .as_deref()
            .filter(|p| !p.is_empty() && *p != path)
        {
            self.discard_image(id, old).await;
        }

        tracing::info!(post_id = id, path = %path, "Post image updated");
        Ok(path)
    }

    async fn discard_image(&self, id: i64, path: &str) {
        if let Err(e) = self.storage.delete(path).await {
            tracing::warn!(post_id = id, path = path, error = %e, "Failed to remove image file");
        }
    }

    /// Read the post's stored image
    pub async fn image(&self, id: i64) -> Result<PostImage, PostServiceError> {
        let post = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get post by ID")?
            .ok_or(PostServiceError::NotFound(id))?;

        let path = post
            .image_path
            .filter(|p| !p.is_empty())
            .ok_or(PostServiceError::ImageNotFound(id))?;

        match self.storage.read(&path).await {
            Ok(data) => Ok(PostImage {
                data,
                content_type: crate::services::storage::content_type_for(&path),
            }),
            Err(StorageError::NotFound(_)) => Err(PostServiceError::ImageNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn invalidate(&self, id: i64) {
        self.cache.delete(&post_cache_key(id)).await;
    }
}

fn validate_post(title: &str, text: &str) -> Result<(), PostServiceError> {
    if title.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if text.trim().is_empty() {
        return Err(PostServiceError::ValidationError(
            "Text cannot be empty".to_string(),
        ));
    }
    Ok(())
}
