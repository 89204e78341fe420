//! Comment service
//!
//! Comments live under a post. Every operation first checks that the post
//! exists, and creating or deleting a comment drops the post's cache entry
//! since its comment count changes.

use std::sync::Arc;

use anyhow::Context;

use crate::cache::MemoryCache;
use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::Comment;
use crate::services::post::post_cache_key;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Comment not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
    cache: Arc<MemoryCache>,
}

impl CommentService {
    pub fn new(
        repo: Arc<dyn CommentRepository>,
        post_repo: Arc<dyn PostRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            post_repo,
            cache,
        }
    }

    /// Comments of a post, oldest first
    pub async fn list(&self, post_id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        self.require_post(post_id).await?;
        let comments = self
            .repo
            .list_by_post(post_id)
            .await
            .context("Failed to list comments")?;
        Ok(comments)
    }

    pub async fn get(&self, post_id: i64, comment_id: i64) -> Result<Comment, CommentServiceError> {
        self.require_post(post_id).await?;
        self.repo
            .get(post_id, comment_id)
            .await
            .context("Failed to get comment")?
            .ok_or(CommentServiceError::NotFound(comment_id))
    }

    pub async fn create(&self, post_id: i64, text: &str) -> Result<Comment, CommentServiceError> {
        validate_text(text)?;
        self.require_post(post_id).await?;

        let comment = self
            .repo
            .create(post_id, text)
            .await
            .context("Failed to create comment")?;

        self.cache.delete(&post_cache_key(post_id)).await;
        tracing::info!(post_id, comment_id = comment.id, "Comment created");
        Ok(comment)
    }

    pub async fn update(
        &self,
        post_id: i64,
        comment_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        validate_text(text)?;
        self.require_post(post_id).await?;

        let comment = self
            .repo
            .update(post_id, comment_id, text)
            .await
            .context("Failed to update comment")?
            .ok_or(CommentServiceError::NotFound(comment_id))?;

        tracing::info!(post_id, comment_id, "Comment updated");
        Ok(comment)
    }

    pub async fn delete(&self, post_id: i64, comment_id: i64) -> Result<(), CommentServiceError> {
        self.require_post(post_id).await?;

        let deleted = self
            .repo
            .delete(post_id, comment_id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(CommentServiceError::NotFound(comment_id));
        }

        self.cache.delete(&post_cache_key(post_id)).await;
        tracing::info!(post_id, comment_id, "Comment deleted");
        Ok(())
    }

    async fn require_post(&self, post_id: i64) -> Result<(), CommentServiceError> {
        let exists = self
            .post_repo
            .exists(post_id)
            .await
            .context("Failed to check post existence")?;
        if exists {
            Ok(())
        } else {
            Err(CommentServiceError::PostNotFound(post_id))
        }
    }
}

fn validate_text(text: &str) -> Result<(), CommentServiceError> {
    if text.trim().is_empty() {
        return Err(CommentServiceError::ValidationError(
            "Comment text cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCommentRepository, SqlxPostRepository, SqlxSearchRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreatePostInput;
    use crate::services::{ImageStorage, PostService};
    use tempfile::TempDir;

    struct Fixture {
        posts: PostService,
        comments: CommentService,
        _dir: TempDir,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let cache = Arc::new(MemoryCache::new());
        let post_repo = SqlxPostRepository::boxed(pool.clone());

        let posts = PostService::new(
            post_repo.clone(),
            SqlxSearchRepository::boxed(pool.clone()),
            cache.clone(),
            Arc::new(ImageStorage::new(dir.path(), 1024)),
        );
        let comments = CommentService::new(SqlxCommentRepository::boxed(pool), post_repo, cache);

        Fixture {
            posts,
            comments,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_comment_crud() {
        let f = setup().await;
        let post = f
            .posts
            .create(CreatePostInput::new("post", "body"))
            .await
            .unwrap();

        let first = f.comments.create(post.id, "first").await.unwrap();
        let second = f.comments.create(post.id, "second").await.unwrap();

        let listed = f.comments.list(post.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );

        let updated = f.comments.update(post.id, first.id, "edited").await.unwrap();
        assert_eq!(updated.text, "edited");
        assert_eq!(f.comments.get(post.id, first.id).await.unwrap().text, "edited");

        f.comments.delete(post.id, first.id).await.unwrap();
        assert!(matches!(
            f.comments.get(post.id, first.id).await,
            Err(CommentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_comment_count_visible_through_cache() {
        let f = setup().await;
        let post = f
            .posts
            .create(CreatePostInput::new("post", "body"))
            .await
            .unwrap();
        assert_eq!(f.posts.get(post.id).await.unwrap().comments_count, 0);

        let comment = f.comments.create(post.id, "hello").await.unwrap();
        assert_eq!(f.posts.get(post.id).await.unwrap().comments_count, 1);

        f.comments.delete(post.id, comment.id).await.unwrap();
        assert_eq!(f.posts.get(post.id).await.unwrap().comments_count, 0);
    }

    #[tokio::test]
    async fn test_missing_post() {
        let f = setup().await;

        assert!(matches!(
            f.comments.list(7).await,
            Err(CommentServiceError::PostNotFound(7))
        ));
        assert!(matches!(
            f.comments.create(7, "text").await,
            Err(CommentServiceError::PostNotFound(7))
        ));
        assert!(matches!(
            f.comments.delete(7, 1).await,
            Err(CommentServiceError::PostNotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_comment_under_wrong_post() {
        let f = setup().await;
        let a = f.posts.create(CreatePostInput::new("a", "body")).await.unwrap();
        let b = f.posts.create(CreatePostInput::new("b", "body")).await.unwrap();
        let comment = f.comments.create(a.id, "on a").await.unwrap();

        assert!(matches!(
            f.comments.get(b.id, comment.id).await,
            Err(CommentServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.comments.update(b.id, comment.id, "moved").await,
            Err(CommentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_text_rejected() {
        let f = setup().await;
        let post = f.posts.create(CreatePostInput::new("p", "body")).await.unwrap();

        assert!(matches!(
            f.comments.create(post.id, "   ").await,
            Err(CommentServiceError::ValidationError(_))
        ));
        let comment = f.comments.create(post.id, "ok").await.unwrap();
        assert!(matches!(
            f.comments.update(post.id, comment.id, "").await,
            Err(CommentServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_post_removes_comments() {
        let f = setup().await;
        let post = f.posts.create(CreatePostInput::new("p", "body")).await.unwrap();
        f.comments.create(post.id, "c").await.unwrap();

        f.posts.delete(post.id).await.unwrap();

        assert!(matches!(
            f.comments.list(post.id).await,
            Err(CommentServiceError::PostNotFound(_))
        ));
    }
}
