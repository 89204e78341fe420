//! Post search
//!
//! Pieces of the search pipeline that do no I/O:
//! - `tokenizer`: raw string to title phrase and `#tag` names
//! - `criteria`: structured filter plus zero-based page window
//! - `predicate`: typed filter fragments rendered into `sqlx::QueryBuilder`
//! - `pagination`: page navigation metadata
//! - `excerpt`: body truncation for listings
//!
//! The store round trips live in `db::repositories::search`, and
//! `services::PostService::search` runs the whole pipeline.

pub mod criteria;
pub mod excerpt;
pub mod pagination;
pub mod predicate;
pub mod tokenizer;

pub use criteria::Criteria;
pub use excerpt::{excerpt, MAX_EXCERPT_CHARS};
pub use pagination::PageMeta;
pub use predicate::Predicate;
pub use tokenizer::{tokenize, ParsedQuery};
