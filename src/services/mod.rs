//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing business rules and validation
//! - Coordinating between repositories, image storage and cache
//! - Translating "missing row" results into typed errors

pub mod comment;
pub mod post;
pub mod storage;

pub use comment::{CommentService, CommentServiceError};
pub use post::{PostImage, PostService, PostServiceError};
pub use storage::{ImageStorage, StorageError};
