//! Post repository
//!
//! Single-row post operations: CRUD, tag-link replacement, counters and the
//! stored image path. Search over many posts lives in `search.rs`.
//!
//! Every write that touches a post's tag links runs in one transaction, so a
//! concurrent reader never sees a post with part of its old tag set removed
//! and the new one not yet linked.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};

use crate::db::{Backend, DynDatabasePool};
use crate::models::Post;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post and link its tags, creating missing tags
    async fn create(&self, title: &str, text: &str, tags: &BTreeSet<String>) -> Result<Post>;

    /// Get a post with its full tag set
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Replace title, text and the whole tag set. `None` if the post is missing.
    async fn update(
        &self,
        id: i64,
        title: &str,
        text: &str,
        tags: &BTreeSet<String>,
    ) -> Result<Option<Post>>;

    /// Delete a post; links and comments go with it
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn exists(&self, id: i64) -> Result<bool>;

    /// Check whether a title is taken, optionally ignoring one post
    async fn exists_by_title(&self, title: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Add one like and return the new count. `None` if the post is missing.
    async fn increment_likes(&self, id: i64) -> Result<Option<i64>>;

    /// Record (or clear) the stored image location
    async fn set_image_path(&self, id: i64, path: Option<&str>) -> Result<bool>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, title: &str, text: &str, tags: &BTreeSet<String>) -> Result<Post> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => create_post_sqlite(pool, title, text, tags).await,
            Backend::Mysql(pool) => create_post_mysql(pool, title, text, tags).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => get_post_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_post_mysql(pool, id).await,
        }
    }

    async fn update(
        &self,
        id: i64,
        title: &str,
        text: &str,
        tags: &BTreeSet<String>,
    ) -> Result<Option<Post>> {
        let updated = match self.pool.backend()? {
            Backend::Sqlite(pool) => update_post_sqlite(pool, id, title, text, tags).await?,
            Backend::Mysql(pool) => update_post_mysql(pool, id, title, text, tags).await?,
        };
        if !updated {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let count: i64 = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE id = ?")
                    .bind(id)
                    .fetch_one(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE id = ?")
                    .bind(id)
                    .fetch_one(pool)
                    .await
            }
        }
        .context("Failed to check post existence")?;
        Ok(count > 0)
    }

    async fn exists_by_title(&self, title: &str, exclude_id: Option<i64>) -> Result<bool> {
        let exclude = exclude_id.unwrap_or(0);
        let sql = "SELECT COUNT(*) FROM posts WHERE title = ? AND id <> ?";
        let count: i64 = match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(title)
                    .bind(exclude)
                    .fetch_one(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(title)
                    .bind(exclude)
                    .fetch_one(pool)
                    .await
            }
        }
        .context("Failed to check title uniqueness")?;
        Ok(count > 0)
    }

    async fn increment_likes(&self, id: i64) -> Result<Option<i64>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => increment_likes_sqlite(pool, id).await,
            Backend::Mysql(pool) => increment_likes_mysql(pool, id).await,
        }
    }

    async fn set_image_path(&self, id: i64, path: Option<&str>) -> Result<bool> {
        if !self.exists(id).await? {
            return Ok(false);
        }
        let sql = "UPDATE posts SET image_path = ? WHERE id = ?";
        match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(path)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(path)
                .bind(id)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to update post image path")?;
        Ok(true)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(
    pool: &SqlitePool,
    title: &str,
    text: &str,
    tags: &BTreeSet<String>,
) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, title_folded, text, likes_count, comments_count, created_at)
        VALUES (?, ?, ?, 0, 0, ?)
        "#,
    )
    .bind(title)
    .bind(fold_title(title))
    .bind(text)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?;

    let id = result.last_insert_rowid();
    link_tags_sqlite(&mut *tx, id, tags).await?;
    tx.commit().await.context("Failed to commit post creation")?;

    Ok(Post {
        id,
        title: title.to_string(),
        text: text.to_string(),
        tags: tags.clone(),
        likes_count: 0,
        comments_count: 0,
        image_path: None,
        created_at: now,
    })
}

async fn get_post_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, text, image_path, likes_count, comments_count, created_at
        FROM posts WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut post = row_to_post_sqlite(&row)?;
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT t.name FROM posts_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ?
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get post tags")?;
    post.tags = names.into_iter().collect();

    Ok(Some(post))
}

async fn update_post_sqlite(
    pool: &SqlitePool,
    id: i64,
    title: &str,
    text: &str,
    tags: &BTreeSet<String>,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock post for update")?;
    if found.is_none() {
        return Ok(false);
    }

    sqlx::query("UPDATE posts SET title = ?, title_folded = ?, text = ? WHERE id = ?")
        .bind(title)
        .bind(fold_title(title))
        .bind(text)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    sqlx::query("DELETE FROM posts_tags WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear post tags")?;

    link_tags_sqlite(&mut *tx, id, tags).await?;
    tx.commit().await.context("Failed to commit post update")?;

    Ok(true)
}

async fn increment_likes_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<i64>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query("UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment likes")?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let likes: i64 = sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read likes count")?;
    tx.commit().await.context("Failed to commit like")?;

    Ok(Some(likes))
}

/// Upsert each tag and link it to the post
async fn link_tags_sqlite(
    conn: &mut SqliteConnection,
    post_id: i64,
    tags: &BTreeSet<String>,
) -> Result<()> {
    for name in tags {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to upsert tag '{}'", name))?;

        sqlx::query("INSERT INTO posts_tags (post_id, tag_id) SELECT ?, id FROM tags WHERE name = ?")
            .bind(post_id)
            .bind(name)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to link tag '{}'", name))?;
    }
    Ok(())
}

/// Case-folded title stored for title search
pub(crate) fn fold_title(title: &str) -> String {
    title.to_lowercase()
}

pub(crate) fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        text: row.try_get("text")?,
        tags: BTreeSet::new(),
        likes_count: row.try_get("likes_count")?,
        comments_count: row.try_get("comments_count")?,
        image_path: row.try_get("image_path")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(
    pool: &MySqlPool,
    title: &str,
    text: &str,
    tags: &BTreeSet<String>,
) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, title_folded, text, likes_count, comments_count, created_at)
        VALUES (?, ?, ?, 0, 0, ?)
        "#,
    )
    .bind(title)
    .bind(fold_title(title))
    .bind(text)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?;

    let id = result.last_insert_id() as i64;
    link_tags_mysql(&mut *tx, id, tags).await?;
    tx.commit().await.context("Failed to commit post creation")?;

    Ok(Post {
        id,
        title: title.to_string(),
        text: text.to_string(),
        tags: tags.clone(),
        likes_count: 0,
        comments_count: 0,
        image_path: None,
        created_at: now,
    })
}

async fn get_post_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, text, image_path, likes_count, comments_count, created_at
        FROM posts WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut post = row_to_post_mysql(&row)?;
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT t.name FROM posts_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ?
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("Failed to get post tags")?;
    post.tags = names.into_iter().collect();

    Ok(Some(post))
}

async fn update_post_mysql(
    pool: &MySqlPool,
    id: i64,
    title: &str,
    text: &str,
    tags: &BTreeSet<String>,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock post for update")?;
    if found.is_none() {
        return Ok(false);
    }

    sqlx::query("UPDATE posts SET title = ?, title_folded = ?, text = ? WHERE id = ?")
        .bind(title)
        .bind(fold_title(title))
        .bind(text)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    sqlx::query("DELETE FROM posts_tags WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear post tags")?;

    link_tags_mysql(&mut *tx, id, tags).await?;
    tx.commit().await.context("Failed to commit post update")?;

    Ok(true)
}

async fn increment_likes_mysql(pool: &MySqlPool, id: i64) -> Result<Option<i64>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query("UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment likes")?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let likes: i64 = sqlx::query_scalar("SELECT likes_count FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read likes count")?;
    tx.commit().await.context("Failed to commit like")?;

    Ok(Some(likes))
}

async fn link_tags_mysql(
    conn: &mut MySqlConnection,
    post_id: i64,
    tags: &BTreeSet<String>,
) -> Result<()> {
    for name in tags {
        sqlx::query("INSERT IGNORE INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to upsert tag '{}'", name))?;

        sqlx::query("INSERT INTO posts_tags (post_id, tag_id) SELECT ?, id FROM tags WHERE name = ?")
            .bind(post_id)
            .bind(name)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to link tag '{}'", name))?;
    }
    Ok(())
}

pub(crate) fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        text: row.try_get("text")?,
        tags: BTreeSet::new(),
        likes_count: row.try_get("likes_count")?,
        comments_count: row.try_get("comments_count")?,
        image_path: row.try_get("image_path")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPostRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo)
    }

    fn tags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create("First", "Body", &tags(&["Y", "X"]))
            .await
            .expect("create should succeed");
        assert!(created.id > 0);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "First");
        assert_eq!(fetched.text, "Body");
        assert_eq!(fetched.tags, tags(&["X", "Y"]));
        assert_eq!(fetched.likes_count, 0);
        assert_eq!(fetched.comments_count, 0);
        assert!(fetched.image_path.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_tag_set() {
        let (_pool, repo) = setup_test_repo().await;
        let post = repo.create("Post", "Body", &tags(&["a", "b"])).await.unwrap();

        let updated = repo
            .update(post.id, "Post 2", "New body", &tags(&["b", "c"]))
            .await
            .unwrap()
            .expect("post should exist");

        assert_eq!(updated.title, "Post 2");
        assert_eq!(updated.text, "New body");
        assert_eq!(updated.tags, tags(&["b", "c"]));
    }

    #[tokio::test]
    async fn test_update_to_empty_tags() {
        let (_pool, repo) = setup_test_repo().await;
        let post = repo.create("Post", "Body", &tags(&["a"])).await.unwrap();

        let updated = repo
            .update(post.id, "Post", "Body", &BTreeSet::new())
            .await
            .unwrap()
            .unwrap();

        assert!(updated.tags.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let (_pool, repo) = setup_test_repo().await;
        let result = repo.update(42, "t", "b", &BTreeSet::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_tags_are_shared_between_posts() {
        let (pool, repo) = setup_test_repo().await;
        repo.create("One", "Body", &tags(&["shared"])).await.unwrap();
        repo.create("Two", "Body", &tags(&["shared"])).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_title_rejected_by_store() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create("Same", "Body", &BTreeSet::new()).await.unwrap();

        assert!(repo.create("Same", "Other", &BTreeSet::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_exists_by_title_excluding() {
        let (_pool, repo) = setup_test_repo().await;
        let post = repo.create("Taken", "Body", &BTreeSet::new()).await.unwrap();

        assert!(repo.exists_by_title("Taken", None).await.unwrap());
        assert!(!repo.exists_by_title("Taken", Some(post.id)).await.unwrap());
        assert!(!repo.exists_by_title("Free", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let post = repo.create("Doomed", "Body", &tags(&["x"])).await.unwrap();

        assert!(repo.delete(post.id).await.unwrap());
        assert!(!repo.exists(post.id).await.unwrap());
        assert!(!repo.delete(post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_likes() {
        let (_pool, repo) = setup_test_repo().await;
        let post = repo.create("Liked", "Body", &BTreeSet::new()).await.unwrap();

        assert_eq!(repo.increment_likes(post.id).await.unwrap(), Some(1));
        assert_eq!(repo.increment_likes(post.id).await.unwrap(), Some(2));
        assert_eq!(repo.increment_likes(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_image_path() {
        let (_pool, repo) = setup_test_repo().await;
        let post = repo.create("Pic", "Body", &BTreeSet::new()).await.unwrap();

        assert!(repo.set_image_path(post.id, Some("post_1/a.png")).await.unwrap());
        let fetched = repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.image_path.as_deref(), Some("post_1/a.png"));

        assert!(!repo.set_image_path(999, Some("x")).await.unwrap());
    }
}
