//! Post search repository
//!
//! Runs a search as three round trips: the total count, the bounded page
//! select, and one batched tag lookup for every post on the page.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row, Sqlite, SqlitePool};

use super::post::{row_to_post_sqlite, row_to_post_mysql};
use crate::db::{Backend, DynDatabasePool};
use crate::models::Post;
use crate::search::{predicate, Criteria};

/// Posts of one page (with tags) and the total number of matches
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub posts: Vec<Post>,
    pub total: i64,
}

/// Post search repository trait
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Count all posts matching the criteria, ignoring the page window
    async fn count_matching(&self, criteria: &Criteria) -> Result<i64>;

    /// Fetch the page window of matching posts, ascending by id, tags empty
    async fn fetch_page(&self, criteria: &Criteria) -> Result<Vec<Post>>;

    /// Tag names for each of the given posts in one query
    async fn fetch_tags_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, BTreeSet<String>>>;

    /// Count, fetch and hydrate one page
    async fn find_page(&self, criteria: &Criteria) -> Result<SearchPage> {
        let total = self.count_matching(criteria).await?;
        if total == 0 {
            return Ok(SearchPage::default());
        }

        let mut posts = self.fetch_page(criteria).await?;
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let tags = self.fetch_tags_for_posts(&ids).await?;
        hydrate_tags(&mut posts, tags);

        tracing::debug!(
            total,
            returned = posts.len(),
            page = criteria.page_number(),
            "Search page fetched"
        );

        Ok(SearchPage { posts, total })
    }
}

/// Give each post its tag set from the batch; posts with no links get none.
pub fn hydrate_tags(posts: &mut [Post], mut tags: HashMap<i64, BTreeSet<String>>) {
    for post in posts {
        post.tags = tags.remove(&post.id).unwrap_or_default();
    }
}

/// SQLx-based search repository implementation
pub struct SqlxSearchRepository {
    pool: DynDatabasePool,
}

impl SqlxSearchRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SearchRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SearchRepository for SqlxSearchRepository {
    async fn count_matching(&self, criteria: &Criteria) -> Result<i64> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => count_matching_sqlite(pool, criteria).await,
            Backend::Mysql(pool) => count_matching_mysql(pool, criteria).await,
        }
    }

    async fn fetch_page(&self, criteria: &Criteria) -> Result<Vec<Post>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => fetch_page_sqlite(pool, criteria).await,
            Backend::Mysql(pool) => fetch_page_mysql(pool, criteria).await,
        }
    }

    async fn fetch_tags_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, BTreeSet<String>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        match self.pool.backend()? {
            Backend::Sqlite(pool) => fetch_tags_sqlite(pool, post_ids).await,
            Backend::Mysql(pool) => fetch_tags_mysql(pool, post_ids).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn count_matching_sqlite(pool: &SqlitePool, criteria: &Criteria) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("");
    predicate::push_count_query(&mut qb, criteria);

    let row = qb
        .build()
        .fetch_one(pool)
        .await
        .context("Failed to count matching posts")?;
    Ok(row.try_get("total")?)
}

async fn fetch_page_sqlite(pool: &SqlitePool, criteria: &Criteria) -> Result<Vec<Post>> {
    let mut qb = QueryBuilder::<Sqlite>::new("");
    predicate::push_select_query(&mut qb, criteria);

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to fetch page of posts")?;
    rows.iter().map(row_to_post_sqlite).collect()
}

async fn fetch_tags_sqlite(
    pool: &SqlitePool,
    post_ids: &[i64],
) -> Result<HashMap<i64, BTreeSet<String>>> {
    let mut qb = QueryBuilder::<Sqlite>::new("");
    predicate::push_tag_batch_query(&mut qb, post_ids);

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to fetch tags for posts")?;

    let mut tags: HashMap<i64, BTreeSet<String>> = HashMap::new();
    for row in rows {
        let post_id: i64 = row.try_get("post_id")?;
        let name: String = row.try_get("name")?;
        tags.entry(post_id).or_default().insert(name);
    }
    Ok(tags)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn count_matching_mysql(pool: &MySqlPool, criteria: &Criteria) -> Result<i64> {
    let mut qb = QueryBuilder::<MySql>::new("");
    predicate::push_count_query(&mut qb, criteria);

    let row = qb
        .build()
        .fetch_one(pool)
        .await
        .context("Failed to count matching posts")?;
    Ok(row.try_get("total")?)
}

async fn fetch_page_mysql(pool: &MySqlPool, criteria: &Criteria) -> Result<Vec<Post>> {
    let mut qb = QueryBuilder::<MySql>::new("");
    predicate::push_select_query(&mut qb, criteria);

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to fetch page of posts")?;
    rows.iter().map(row_to_post_mysql).collect()
}

async fn fetch_tags_mysql(
    pool: &MySqlPool,
    post_ids: &[i64],
) -> Result<HashMap<i64, BTreeSet<String>>> {
    let mut qb = QueryBuilder::<MySql>::new("");
    predicate::push_tag_batch_query(&mut qb, post_ids);

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to fetch tags for posts")?;

    let mut tags: HashMap<i64, BTreeSet<String>> = HashMap::new();
    for row in rows {
        let post_id: i64 = row.try_get("post_id")?;
        let name: String = row.try_get("name")?;
        tags.entry(post_id).or_default().insert(name);
    }
    Ok(tags)
}
