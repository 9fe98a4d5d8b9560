//! Project record lookup: project id -> linked repository.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use fred::clients::Pool;
use fred::interfaces::HashesInterface;
use tracing::trace;

use crate::config::{Config, ProjectSource};

/// The parts of a project record the structure service needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: String,
    /// `owner/repo`; empty when the project has no linked repository.
    pub repo_name: String,
}

#[async_trait::async_trait]
pub trait ProjectLookup: Send + Sync {
    async fn project_by_id(&self, id: &str) -> Result<Option<ProjectRecord>>;
}

// ---------------------------------------------------------------------------
// KeyDB
// ---------------------------------------------------------------------------

pub(crate) fn project_key(id: &str) -> String {
    format!("reposcope:project:{id}")
}

/// Project records stored as KeyDB hashes at `reposcope:project:{id}`.
#[derive(Clone)]
pub struct KeyDbProjectStore {
    pool: Pool,
}

impl KeyDbProjectStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProjectLookup for KeyDbProjectStore {
    async fn project_by_id(&self, id: &str) -> Result<Option<ProjectRecord>> {
        let key = project_key(id);
        let map: HashMap<String, String> =
            self.pool.hgetall(&key).await.context("HGETALL project")?;
        if map.is_empty() {
            trace!(project_id = id, "project record not found");
            return Ok(None);
        }
        Ok(Some(ProjectRecord {
            id: id.to_string(),
            repo_name: map.get("repo_name").cloned().unwrap_or_default(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

/// Project records fixed in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticProjectStore {
    entries: HashMap<String, String>,
}

impl StaticProjectStore {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

#[async_trait::async_trait]
impl ProjectLookup for StaticProjectStore {
    async fn project_by_id(&self, id: &str) -> Result<Option<ProjectRecord>> {
        Ok(self.entries.get(id).map(|repo_name| ProjectRecord {
            id: id.to_string(),
            repo_name: repo_name.trim().to_string(),
        }))
    }
}

/// Build the project lookup selected in the configuration.
pub fn build_project_lookup(config: &Config, keydb: Option<&Pool>) -> Result<Arc<dyn ProjectLookup>> {
    match config.projects.source {
        ProjectSource::Keydb => {
            let pool = keydb.ok_or_else(|| {
                anyhow::anyhow!("project source is keydb but no KeyDB pool was built")
            })?;
            Ok(Arc::new(KeyDbProjectStore::new(pool.clone())))
        }
        ProjectSource::Static => Ok(Arc::new(StaticProjectStore::new(
            config.projects.entries.clone(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(project_key("42"), "reposcope:project:42");
    }

    #[tokio::test]
    async fn static_store_lookup() {
        let store = StaticProjectStore::new(HashMap::from([
            ("1".to_string(), "acme/widgets".to_string()),
            ("2".to_string(), " ".to_string()),
        ]));

        assert_eq!(
            store.project_by_id("1").await.unwrap(),
            Some(ProjectRecord {
                id: "1".into(),
                repo_name: "acme/widgets".into()
            })
        );
        assert_eq!(store.project_by_id("2").await.unwrap().unwrap().repo_name, "");
        assert_eq!(store.project_by_id("3").await.unwrap(), None);
    }
}
