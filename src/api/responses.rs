//! Shared API response types

use serde::{Deserialize, Serialize};

use crate::models::{Comment, Post, PostPage};

/// Post as returned by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            text: post.text,
            tags: post.tags.into_iter().collect(),
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            created_at: post.created_at.to_rfc3339(),
        }
    }
}

/// One page of search results. `page_number` is one-based, echoing the
/// request; `last_page_index` stays zero-based.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostPageResponse {
    pub posts: Vec<PostResponse>,
    pub total: i64,
    pub page_number: u32,
    pub page_size: u32,
    pub last_page_index: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl From<PostPage> for PostPageResponse {
    fn from(page: PostPage) -> Self {
        let meta = page.meta;
        Self {
            posts: page.posts.into_iter().map(PostResponse::from).collect(),
            total: meta.total,
            page_number: meta.page_number.saturating_add(1),
            page_size: meta.page_size,
            last_page_index: meta.last_page_index,
            has_previous: meta.has_previous,
            has_next: meta.has_next,
        }
    }
}

/// Comment as returned by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            text: comment.text,
            created_at: comment.created_at.to_rfc3339(),
            updated_at: comment.updated_at.to_rfc3339(),
        }
    }
}

/// Response for a stored image
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub image_path: String,
}
