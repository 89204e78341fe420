//! Data models
//!
//! Entities stored by the backend (Post, Comment), their input types, and the
//! page container returned by post search.

mod comment;
mod post;

pub use comment::Comment;
pub use post::{normalize_tags, CreatePostInput, Post, PostPage, UpdatePostInput};
