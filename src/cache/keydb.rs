use anyhow::{Context, Result};
use fred::clients::Pool;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use tracing::trace;

use super::StructureCache;

/// Structure cache stored in KeyDB with `SET .. EX`.
#[derive(Clone)]
pub struct KeyDbCache {
    pool: Pool,
}

impl KeyDbCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StructureCache for KeyDbCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let val: Option<String> = self.pool.get(key).await.context("KeyDB GET failed")?;
        if val.is_some() {
            trace!(key, "structure cache hit");
        }
        Ok(val)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let ttl = i64::try_from(ttl_secs).context("cache TTL out of range")?;
        let _: () = self
            .pool
            .set(key, value, Some(Expiration::EX(ttl)), None, false)
            .await
            .context("KeyDB SET failed")?;
        trace!(key, ttl_secs, "structure cache set");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "keydb"
    }
}
