//! Comment repository
//!
//! Comments are always addressed through their post: every lookup filters on
//! both ids, so a comment id under the wrong post reads as missing. Creating
//! and deleting a comment adjusts the post's `comments_count` in the same
//! transaction.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};

use crate::db::{Backend, DynDatabasePool};
use crate::models::Comment;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments of a post, oldest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>>;

    async fn get(&self, post_id: i64, comment_id: i64) -> Result<Option<Comment>>;

    /// Insert a comment and bump the post's comment count
    async fn create(&self, post_id: i64, text: &str) -> Result<Comment>;

    async fn update(&self, post_id: i64, comment_id: i64, text: &str) -> Result<Option<Comment>>;

    /// Delete a comment and lower the post's comment count
    async fn delete(&self, post_id: i64, comment_id: i64) -> Result<bool>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_COMMENT: &str = "SELECT id, post_id, text, created_at, updated_at FROM comments";

const DECREMENT_COMMENTS: &str = "UPDATE posts SET comments_count = \
     CASE WHEN comments_count > 0 THEN comments_count - 1 ELSE 0 END WHERE id = ?";

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let sql = format!("{} WHERE post_id = ? ORDER BY id ASC", SELECT_COMMENT);
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(post_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list comments")?;
                rows.iter().map(row_to_comment_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(post_id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list comments")?;
                rows.iter().map(row_to_comment_mysql).collect()
            }
        }
    }

    async fn get(&self, post_id: i64, comment_id: i64) -> Result<Option<Comment>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => get_comment_sqlite(pool, post_id, comment_id).await,
            Backend::Mysql(pool) => get_comment_mysql(pool, post_id, comment_id).await,
        }
    }

    async fn create(&self, post_id: i64, text: &str) -> Result<Comment> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => create_comment_sqlite(pool, post_id, text).await,
            Backend::Mysql(pool) => create_comment_mysql(pool, post_id, text).await,
        }
    }

    async fn update(&self, post_id: i64, comment_id: i64, text: &str) -> Result<Option<Comment>> {
        if self.get(post_id, comment_id).await?.is_none() {
            return Ok(None);
        }

        let now = Utc::now();
        let sql = "UPDATE comments SET text = ?, updated_at = ? WHERE id = ? AND post_id = ?";
        match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(text)
                .bind(now)
                .bind(comment_id)
                .bind(post_id)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(text)
                .bind(now)
                .bind(comment_id)
                .bind(post_id)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to update comment")?;

        self.get(post_id, comment_id).await
    }

    async fn delete(&self, post_id: i64, comment_id: i64) -> Result<bool> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => delete_comment_sqlite(pool, post_id, comment_id).await,
            Backend::Mysql(pool) => delete_comment_mysql(pool, post_id, comment_id).await,
        }
    }
}

// SQLite implementations

async fn get_comment_sqlite(pool: &SqlitePool, post_id: i64, comment_id: i64) -> Result<Option<Comment>> {
    let sql = format!("{} WHERE id = ? AND post_id = ?", SELECT_COMMENT);
    let row = sqlx::query(&sql)
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    row.as_ref().map(row_to_comment_sqlite).transpose()
}

async fn create_comment_sqlite(pool: &SqlitePool, post_id: i64, text: &str) -> Result<Comment> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        "INSERT INTO comments (post_id, text, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(post_id)
    .bind(text)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;
    let id = result.last_insert_rowid();

    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment comment count")?;

    tx.commit().await.context("Failed to commit comment creation")?;

    Ok(Comment {
        id,
        post_id,
        text: text.to_string(),
        created_at: now,
        updated_at: now,
    })
}

async fn delete_comment_sqlite(pool: &SqlitePool, post_id: i64, comment_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query("DELETE FROM comments WHERE id = ? AND post_id = ?")
        .bind(comment_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete comment")?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(DECREMENT_COMMENTS)
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement comment count")?;

    tx.commit().await.context("Failed to commit comment deletion")?;
    Ok(true)
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// MySQL implementations

async fn get_comment_mysql(pool: &MySqlPool, post_id: i64, comment_id: i64) -> Result<Option<Comment>> {
    let sql = format!("{} WHERE id = ? AND post_id = ?", SELECT_COMMENT);
    let row = sqlx::query(&sql)
        .bind(comment_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    row.as_ref().map(row_to_comment_mysql).transpose()
}

async fn create_comment_mysql(pool: &MySqlPool, post_id: i64, text: &str) -> Result<Comment> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        "INSERT INTO comments (post_id, text, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(post_id)
    .bind(text)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;
    let id = result.last_insert_id() as i64;

    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment comment count")?;

    tx.commit().await.context("Failed to commit comment creation")?;

    Ok(Comment {
        id,
        post_id,
        text: text.to_string(),
        created_at: now,
        updated_at: now,
    })
}

async fn delete_comment_mysql(pool: &MySqlPool, post_id: i64, comment_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query("DELETE FROM comments WHERE id = ? AND post_id = ?")
        .bind(comment_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete comment")?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(DECREMENT_COMMENTS)
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement comment count")?;

    tx.commit().await.context("Failed to commit comment deletion")?;
    Ok(true)
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{PostRepository, SqlxPostRepository};
    use crate::db::{create_test_pool, migrations};
    use std::collections::BTreeSet;

    async fn setup() -> (SqlxPostRepository, SqlxCommentRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (
            SqlxPostRepository::new(pool.clone()),
            SqlxCommentRepository::new(pool),
        )
    }

    #[tokio::test]
    async fn test_create_increments_post_count() {
        let (posts, comments) = setup().await;
        let post = posts.create("Post", "Body", &BTreeSet::new()).await.unwrap();

        let first = comments.create(post.id, "first").await.unwrap();
        comments.create(post.id, "second").await.unwrap();

        assert_eq!(first.post_id, post.id);
        let post = posts.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(post.comments_count, 2);

        let listed = comments.list_by_post(post.id).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_delete_decrements_post_count() {
        let (posts, comments) = setup().await;
        let post = posts.create("Post", "Body", &BTreeSet::new()).await.unwrap();
        let comment = comments.create(post.id, "bye").await.unwrap();

        assert!(comments.delete(post.id, comment.id).await.unwrap());
        assert!(!comments.delete(post.id, comment.id).await.unwrap());

        let post = posts.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(post.comments_count, 0);
    }

    #[tokio::test]
    async fn test_comment_under_wrong_post_is_missing() {
        let (posts, comments) = setup().await;
        let a = posts.create("A", "Body", &BTreeSet::new()).await.unwrap();
        let b = posts.create("B", "Body", &BTreeSet::new()).await.unwrap();
        let comment = comments.create(a.id, "on a").await.unwrap();

        assert!(comments.get(b.id, comment.id).await.unwrap().is_none());
        assert!(comments.update(b.id, comment.id, "x").await.unwrap().is_none());
        assert!(!comments.delete(b.id, comment.id).await.unwrap());
        assert!(comments.get(a.id, comment.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_text() {
        let (posts, comments) = setup().await;
        let post = posts.create("Post", "Body", &BTreeSet::new()).await.unwrap();
        let comment = comments.create(post.id, "old").await.unwrap();

        let updated = comments
            .update(post.id, comment.id, "new")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.text, "new");
        assert!(updated.updated_at >= comment.updated_at);
    }

    #[tokio::test]
    async fn test_comments_removed_with_post() {
        let (posts, comments) = setup().await;
        let post = posts.create("Post", "Body", &BTreeSet::new()).await.unwrap();
        comments.create(post.id, "gone soon").await.unwrap();

        posts.delete(post.id).await.unwrap();

        assert!(comments.list_by_post(post.id).await.unwrap().is_empty());
    }
}
