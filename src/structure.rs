//! Project structure service: cache-aside orchestration around the tree
//! walker.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{error, info, instrument, warn};

use crate::cache::StructureCache;
use crate::credentials::CredentialResolver;
use crate::error::ServiceError;
use crate::forge::RepoHandle;
use crate::metrics::{CacheStatus, MetricsRegistry};
use crate::projects::ProjectLookup;
use crate::tree::{format_tree, TreeWalker};

/// Cache key for a structure outline.  Includes the depth limit so output
/// rendered under one limit is never served under another.
pub fn cache_key(project_id: &str, path: Option<&str>, max_depth: usize) -> String {
    format!(
        "project_structure:{project_id}:exact_path_{}:depth_{max_depth}",
        path.unwrap_or("None")
    )
}

pub struct RepoStructureService {
    projects: Arc<dyn ProjectLookup>,
    resolver: Arc<dyn CredentialResolver>,
    cache: Arc<dyn StructureCache>,
    walker: TreeWalker,
    ttl_secs: u64,
    metrics: MetricsRegistry,
}

impl RepoStructureService {
    pub fn new(
        projects: Arc<dyn ProjectLookup>,
        resolver: Arc<dyn CredentialResolver>,
        cache: Arc<dyn StructureCache>,
        walker: TreeWalker,
        ttl_secs: u64,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            projects,
            resolver,
            cache,
            walker,
            ttl_secs,
            metrics,
        }
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend()
    }

    /// Return the indented outline of the project's repository, optionally
    /// scoped to `path`.  Leading slashes on the scope are ignored and an
    /// empty scope means the whole repository.
    #[instrument(skip(self))]
    pub async fn get_project_structure(
        &self,
        project_id: &str,
        path: Option<&str>,
    ) -> Result<String, ServiceError> {
        let path = path
            .map(|p| p.trim_start_matches('/'))
            .filter(|p| !p.is_empty());
        info!("fetching project structure");

        let result = self.fetch(project_id, path).await.map_err(ServiceError::from_anyhow);
        if let Err(e) = &result {
            self.metrics.metrics.record_error(e.class());
            if matches!(e, ServiceError::Internal(_)) {
                error!(error = %e, "error fetching project structure");
            }
        }
        result
    }

    async fn fetch(&self, project_id: &str, path: Option<&str>) -> anyhow::Result<String> {
        let key = cache_key(project_id, path, self.walker.max_depth());

        if let Some(cached) = self.cache.get(&key).await? {
            self.metrics.metrics.record_cache(CacheStatus::Hit);
            info!("project structure found in cache");
            return Ok(cached);
        }
        self.metrics.metrics.record_cache(CacheStatus::Miss);

        let project = self
            .projects
            .project_by_id(project_id)
            .await
            .with_context(|| format!("failed to load project {project_id}"))?
            .ok_or_else(|| ServiceError::not_found("Project not found"))?;

        if project.repo_name.is_empty() {
            return Err(ServiceError::not_found("Project has no associated GitHub repository").into());
        }

        let repo = self.resolver.resolve_repo(&project.repo_name).await?;

        if let Some(scope) = path {
            check_scope(repo.as_ref(), scope).await?;
        }

        let started = Instant::now();
        let root = self
            .walker
            .walk(repo.as_ref(), path.unwrap_or_default().to_string(), 0, path)
            .await;
        self.metrics
            .metrics
            .walk_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        let formatted = format_tree(&root);

        if let Err(e) = self.cache.set_with_ttl(&key, &formatted, self.ttl_secs).await {
            warn!(error = %e, "failed to cache project structure");
        }

        Ok(formatted)
    }
}

/// Check that the scope exists and is a directory before walking it; an
/// invalid scope would otherwise render as an empty tree.
async fn check_scope(repo: &dyn RepoHandle, scope: &str) -> Result<(), ServiceError> {
    let contents = repo
        .list_contents(scope)
        .await
        .map_err(|_| ServiceError::not_found(format!("Path {scope} not found in repository")))?;

    match contents {
        crate::forge::Contents::Single(entry) if !entry.is_dir() => Err(ServiceError::bad_request(
            format!("Path {scope} is a file, not a directory"),
        )),
        _ => Ok(()),
    }
}
