use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tracing::trace;

use super::StructureCache;

/// Process-local structure cache.  Expired entries are dropped lazily on
/// read and on write.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|(_, exp)| *exp > now).count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl StructureCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => {
                trace!(key, "structure cache hit");
                Ok(Some(value.clone()))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, (_, exp)| *exp > now);
        entries.insert(
            key.to_string(),
            (value.to_string(), now + Duration::from_secs(ttl_secs)),
        );
        trace!(key, ttl_secs, "structure cache set");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
