//! Cache-aside store for rendered structure outlines.
//!
//! Entries are opaque text with a TTL.  The production backend is KeyDB so
//! that every replica shares one cache; [`MemoryCache`] serves single-node
//! runs and tests.

pub mod keydb;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;

use crate::config::{CacheBackend, Config};

pub use keydb::KeyDbCache;
pub use memory::MemoryCache;

/// Key/value store with per-entry expiry.
#[async_trait::async_trait]
pub trait StructureCache: Send + Sync {
    /// Returns `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Build the cache backend selected in the configuration.
pub fn build_cache(config: &Config, keydb: Option<&fred::clients::Pool>) -> Result<Arc<dyn StructureCache>> {
    match config.cache.backend {
        CacheBackend::Keydb => {
            let pool = keydb
                .ok_or_else(|| anyhow::anyhow!("cache backend is keydb but no KeyDB pool was built"))?;
            Ok(Arc::new(KeyDbCache::new(pool.clone())))
        }
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
    }
}
