//! Cache layer
//!
//! Process-local cache (moka) for single-post reads. Services own the key
//! scheme and invalidate entries on every write.
//!
//! ```rust,ignore
//! use tagpress::cache::create_cache;
//! use tagpress::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("post:id:1", &post).await?;
//! ```

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    Arc::new(MemoryCache::with_capacity_and_ttl(config.capacity, ttl))
}
