//! Post model
//!
//! This module provides:
//! - `Post` entity with its tag set and counters
//! - Input types for creating and updating posts
//! - `PostPage`, one page of search results with its pagination metadata

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::PageMeta;

/// Post entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier, assigned by the store
    pub id: i64,
    /// Post title, unique across posts
    pub title: String,
    /// Body text
    pub text: String,
    /// Tag names linked to this post
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Like count
    #[serde(default)]
    pub likes_count: i64,
    /// Comment count
    #[serde(default)]
    pub comments_count: i64,
    /// Stored image location, relative to the image directory
    #[serde(default)]
    pub image_path: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            tags: Vec::new(),
        }
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Input for replacing a post's title, body and tag set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostInput {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UpdatePostInput {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            tags: Vec::new(),
        }
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Normalize user-supplied tag names: trim, drop blanks, de-duplicate.
pub fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// One page of posts, ordered by ascending id
#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl PostPage {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }
}
