//! GitHub REST API client pieces used by the credential resolver and the
//! tree walker.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GithubConfig;
use crate::metrics::MetricsRegistry;

use super::rate_limit::RateLimitState;
use super::{Contents, RepoHandle};

const ACCEPT: &str = "application/vnd.github+json";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Subset of `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
struct Installation {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct InstallationToken {
    token: String,
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

/// Shared GitHub API settings plus the process-wide rate-limit state.
pub struct GitHubApi {
    http_client: reqwest::Client,
    api_url: String,
    api_version: String,
    rate_limit: RateLimitState,
    metrics: MetricsRegistry,
}

impl GitHubApi {
    pub fn new(
        config: &GithubConfig,
        http_client: reqwest::Client,
        rate_limit: RateLimitState,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            rate_limit,
            metrics,
        }
    }

    /// Build an API URL from path segments, percent-encoding each one.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .with_context(|| format!("invalid GitHub API url: {}", self.api_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API url cannot be a base: {}", self.api_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, bearer: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(bearer)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", &self.api_version)
    }

    /// Send a request, record the call, and absorb rate-limit headers.
    async fn send(&self, endpoint: &str, req: RequestBuilder) -> Result<Response> {
        self.metrics.metrics.record_upstream_call(endpoint);
        let resp = req
            .send()
            .await
            .with_context(|| format!("GitHub API request failed ({endpoint})"))?;
        if let Some(remaining) = self.rate_limit.update_from_headers(resp.headers()) {
            self.metrics
                .metrics
                .upstream_api_rate_limit_remaining
                .set(remaining.min(i64::MAX as u64) as i64);
        }
        Ok(resp)
    }

    /// Turn a non-success status into a descriptive error.
    fn status_error(&self, endpoint: &str, target: &str, status: StatusCode) -> anyhow::Error {
        match status {
            StatusCode::NOT_FOUND => anyhow!("{target} not found ({endpoint})"),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if self.rate_limit.is_exhausted() =>
            {
                anyhow!(
                    "GitHub API rate limit exhausted while reading {target}; resets in {}s",
                    self.rate_limit.retry_after_secs()
                )
            }
            _ => anyhow!("GitHub API returned {status} for {target} ({endpoint})"),
        }
    }

    /// `GET /repos/{owner}/{repo}`
    pub async fn repo_metadata(&self, owner: &str, repo: &str, token: &str) -> Result<RepoMetadata> {
        let url = self.url(["repos", owner, repo])?;
        let resp = self
            .send("repos", self.request(Method::GET, url, token))
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(self.status_error("repos", &format!("repository {owner}/{repo}"), status));
        }
        resp.json()
            .await
            .context("failed to parse repository metadata")
    }

    /// `GET /repos/{owner}/{repo}/installation`, authenticated as the app.
    pub async fn installation_id(&self, owner: &str, repo: &str, app_jwt: &str) -> Result<u64> {
        let url = self.url(["repos", owner, repo, "installation"])?;
        let resp = self
            .send("installation", self.request(Method::GET, url, app_jwt))
            .await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("failed to get installation id for {owner}/{repo}: {status}");
        }
        let installation: Installation = resp
            .json()
            .await
            .context("failed to parse installation response")?;
        Ok(installation.id)
    }

    /// `POST /app/installations/{id}/access_tokens`
    pub async fn installation_token(&self, installation_id: u64, app_jwt: &str) -> Result<String> {
        let id = installation_id.to_string();
        let url = self.url(["app", "installations", id.as_str(), "access_tokens"])?;
        let resp = self
            .send("access_tokens", self.request(Method::POST, url, app_jwt))
            .await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("failed to create access token for installation {installation_id}: {status}");
        }
        let token: InstallationToken = resp
            .json()
            .await
            .context("failed to parse installation token response")?;
        Ok(token.token)
    }

    /// `GET /repos/{owner}/{repo}/contents/{path}` on the default branch.
    pub async fn contents(&self, owner: &str, repo: &str, path: &str, token: &str) -> Result<Contents> {
        let url = self.contents_url(owner, repo, path)?;
        let resp = self
            .send("contents", self.request(Method::GET, url, token))
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let target = format!("path '{path}' in {owner}/{repo}");
            return Err(self.status_error("contents", &target, status));
        }
        resp.json()
            .await
            .with_context(|| format!("failed to parse contents listing for '{path}'"))
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> Result<Url> {
        let mut segments = vec!["repos", owner, repo, "contents"];
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if path_segments.is_empty() {
            // Root listing: trailing slash.
            segments.push("");
        } else {
            segments.extend(path_segments);
        }
        self.url(segments)
    }
}

// ---------------------------------------------------------------------------
// Repository handle
// ---------------------------------------------------------------------------

/// A repository resolved with a concrete token.
pub struct GitHubRepo {
    api: Arc<GitHubApi>,
    owner: String,
    metadata: RepoMetadata,
    token: String,
}

impl GitHubRepo {
    pub fn new(api: Arc<GitHubApi>, owner: &str, metadata: RepoMetadata, token: String) -> Self {
        Self {
            api,
            owner: owner.to_string(),
            metadata,
            token,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.metadata.full_name
    }
}

impl std::fmt::Debug for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepo")
            .field("full_name", &self.metadata.full_name)
            .field("default_branch", &self.metadata.default_branch)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl RepoHandle for GitHubRepo {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn default_branch(&self) -> &str {
        &self.metadata.default_branch
    }

    async fn list_contents(&self, path: &str) -> Result<Contents> {
        let contents = self
            .api
            .contents(&self.owner, &self.metadata.name, path, &self.token)
            .await;
        match &contents {
            Ok(_) => debug!(repo = %self.full_name(), path, "listed contents"),
            Err(e) => warn!(repo = %self.full_name(), path, error = %e, "contents listing failed"),
        }
        contents
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
