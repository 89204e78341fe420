//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one concern.

pub mod comment;
pub mod post;
pub mod search;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use search::{hydrate_tags, SearchPage, SearchRepository, SqlxSearchRepository};
