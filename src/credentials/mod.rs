//! Repository credential resolution.
//!
//! A [`CredentialResolver`] turns `owner/repo` into an authenticated
//! [`RepoHandle`].  The GitHub implementation tries the app installation
//! first and falls back to a rotating pool of personal access tokens; both
//! strategies live here so callers see a single call.

pub mod github;
pub mod token_pool;

use std::sync::Arc;

use crate::error::ServiceError;
use crate::forge::RepoHandle;

pub use github::GitHubCredentialResolver;
pub use token_pool::TokenPool;

#[async_trait::async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve an authenticated handle.  Fails with
    /// [`ServiceError::NotFound`] when no credential can reach the repository.
    async fn resolve_repo(&self, repo_name: &str) -> Result<Arc<dyn RepoHandle>, ServiceError>;

    /// Whether the repository is reachable with public credentials alone.
    async fn is_public_repo(&self, repo_name: &str) -> bool;
}
