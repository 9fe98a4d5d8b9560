//! GitHub repository resolution: app installation first, public token pool
//! second.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument};

use crate::error::ServiceError;
use crate::forge::github::{GitHubApi, GitHubRepo};
use crate::forge::{split_repo_name, RepoHandle};
use crate::metrics::{AuthMode, MetricsRegistry};

use super::token_pool::TokenPool;
use super::CredentialResolver;

pub struct GitHubCredentialResolver {
    api: Arc<GitHubApi>,
    tokens: Arc<TokenPool>,
    app_jwt_file: Option<String>,
    metrics: MetricsRegistry,
}

impl GitHubCredentialResolver {
    pub fn new(
        api: Arc<GitHubApi>,
        tokens: Arc<TokenPool>,
        app_jwt_file: Option<String>,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            api,
            tokens,
            app_jwt_file,
            metrics,
        }
    }

    /// Current app JWT, or `None` when app auth is not configured.
    async fn app_jwt(&self) -> Result<Option<String>> {
        let Some(path) = &self.app_jwt_file else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(path).await {
            Ok(jwt) if !jwt.trim().is_empty() => Ok(Some(jwt.trim().to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read app JWT from {path}")),
        }
    }

    /// Resolve via the app installation that covers `owner/repo`.
    async fn resolve_with_app(&self, owner: &str, repo: &str) -> Result<GitHubRepo> {
        let jwt = self
            .app_jwt()
            .await?
            .ok_or_else(|| anyhow::anyhow!("GitHub App credentials not configured"))?;
        let installation_id = self.api.installation_id(owner, repo, &jwt).await?;
        let token = self.api.installation_token(installation_id, &jwt).await?;
        let metadata = self.api.repo_metadata(owner, repo, &token).await?;
        debug!(%owner, %repo, installation_id, "resolved repository via app installation");
        Ok(GitHubRepo::new(Arc::clone(&self.api), owner, metadata, token))
    }

    /// Resolve with the next token from the public pool.
    async fn resolve_with_public_token(&self, owner: &str, repo: &str) -> Result<GitHubRepo> {
        let token = self.tokens.next_token().to_string();
        let metadata = self.api.repo_metadata(owner, repo, &token).await?;
        Ok(GitHubRepo::new(Arc::clone(&self.api), owner, metadata, token))
    }
}

#[async_trait::async_trait]
impl CredentialResolver for GitHubCredentialResolver {
    #[instrument(skip(self))]
    async fn resolve_repo(&self, repo_name: &str) -> Result<Arc<dyn RepoHandle>, ServiceError> {
        let not_found = || {
            ServiceError::not_found(format!(
                "Repository {repo_name} not found or inaccessible on GitHub"
            ))
        };
        let (owner, repo) = split_repo_name(repo_name).ok_or_else(not_found)?;

        match self.resolve_with_app(owner, repo).await {
            Ok(handle) => {
                self.metrics.metrics.record_resolution(AuthMode::App);
                return Ok(Arc::new(handle));
            }
            Err(e) => info!(%repo_name, error = %e, "failed to access private repo"),
        }

        match self.resolve_with_public_token(owner, repo).await {
            Ok(handle) => {
                self.metrics.metrics.record_resolution(AuthMode::Public);
                Ok(Arc::new(handle))
            }
            Err(e) => {
                error!(%repo_name, error = %e, "failed to access public repo");
                Err(not_found())
            }
        }
    }

    async fn is_public_repo(&self, repo_name: &str) -> bool {
        let Some((owner, repo)) = split_repo_name(repo_name) else {
            return false;
        };
        self.resolve_with_public_token(owner, repo).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GithubConfig;
    use crate::forge::rate_limit::RateLimitState;
    use axum::extract::{Path as AxumPath, State};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::io::Write;
    use std::sync::Mutex;

    fn resolver(app_jwt_file: Option<String>) -> GitHubCredentialResolver {
        resolver_for(&GithubConfig::default().api_url, app_jwt_file, MetricsRegistry::new())
    }

    fn resolver_for(
        api_url: &str,
        app_jwt_file: Option<String>,
        metrics: MetricsRegistry,
    ) -> GitHubCredentialResolver {
        let config = GithubConfig {
            api_url: api_url.to_string(),
            ..GithubConfig::default()
        };
        let api = GitHubApi::new(
            &config,
            reqwest::Client::new(),
            RateLimitState::new(),
            metrics.clone(),
        );
        GitHubCredentialResolver::new(
            Arc::new(api),
            Arc::new(TokenPool::parse("ghp_test").unwrap()),
            app_jwt_file,
            metrics,
        )
    }

    // -----------------------------------------------------------------------
    // Stub GitHub API
    // -----------------------------------------------------------------------

    /// Minimal GitHub API serving `acme/widgets`.  Every request is recorded
    /// as `(endpoint, Authorization header)`.
    #[derive(Clone, Default)]
    struct StubGitHub {
        has_installation: bool,
        repo_visible: bool,
        seen: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl StubGitHub {
        fn record(&self, endpoint: &str, headers: &HeaderMap) {
            let auth = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            self.seen.lock().unwrap().push((endpoint.to_string(), auth));
        }

        fn auth_for(&self, endpoint: &str) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|(e, _)| e == endpoint)
                .map(|(_, auth)| auth.clone())
                .collect()
        }
    }

    async fn stub_installation(
        State(stub): State<StubGitHub>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, StatusCode> {
        stub.record("installation", &headers);
        if stub.has_installation {
            Ok(Json(json!({"id": 77})))
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    async fn stub_access_token(
        State(stub): State<StubGitHub>,
        AxumPath(id): AxumPath<u64>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, StatusCode> {
        stub.record("access_tokens", &headers);
        if id == 77 {
            Ok(Json(json!({"token": "ghs_installation", "expires_at": "2030-01-01T00:00:00Z"})))
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    async fn stub_repo(
        State(stub): State<StubGitHub>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, StatusCode> {
        stub.record("repos", &headers);
        if stub.repo_visible {
            Ok(Json(json!({
                "id": 1,
                "name": "widgets",
                "full_name": "acme/widgets",
                "default_branch": "trunk",
                "private": false
            })))
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    async fn stub_root_contents(
        State(stub): State<StubGitHub>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, StatusCode> {
        stub.record("contents", &headers);
        if headers.get(header::ACCEPT).and_then(|v| v.to_str().ok())
            != Some("application/vnd.github+json")
        {
            return Err(StatusCode::NOT_ACCEPTABLE);
        }
        Ok(Json(json!([
            {"name": "a.txt", "path": "a.txt", "type": "file", "size": 3},
            {"name": "src", "path": "src", "type": "dir"}
        ])))
    }

    /// Serve `stub` on an ephemeral local port and return its base URL.
    async fn serve(stub: StubGitHub) -> String {
        let app = Router::new()
            .route("/repos/{owner}/{repo}", get(stub_repo))
            .route("/repos/{owner}/{repo}/installation", get(stub_installation))
            .route("/repos/{owner}/{repo}/contents/", get(stub_root_contents))
            .route("/app/installations/{id}/access_tokens", post(stub_access_token))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn jwt_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "app.jwt.value").unwrap();
        file
    }

    #[tokio::test]
    async fn falls_back_to_public_token_when_app_has_no_installation() {
        let stub = StubGitHub {
            has_installation: false,
            repo_visible: true,
            ..StubGitHub::default()
        };
        let api_url = serve(stub.clone()).await;
        let jwt = jwt_file();
        let metrics = MetricsRegistry::new();
        let r = resolver_for(&api_url, Some(jwt.path().display().to_string()), metrics.clone());

        let handle = r.resolve_repo("acme/widgets").await.unwrap();
        assert_eq!(handle.name(), "widgets");
        assert_eq!(handle.default_branch(), "trunk");

        let entries = handle.list_contents("").await.unwrap().into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert!(entries[1].is_dir());

        assert_eq!(stub.auth_for("installation"), vec!["Bearer app.jwt.value"]);
        assert!(stub.auth_for("access_tokens").is_empty());
        assert_eq!(stub.auth_for("contents"), vec!["Bearer ghp_test"]);

        let text = metrics.encode().unwrap();
        assert!(text.contains("reposcope_credential_resolutions_total{mode=\"Public\"} 1"));
        assert!(!text.contains("mode=\"App\""));
    }

    #[tokio::test]
    async fn unreachable_repository_is_not_found() {
        let stub = StubGitHub::default();
        let api_url = serve(stub.clone()).await;
        let jwt = jwt_file();
        let metrics = MetricsRegistry::new();
        let r = resolver_for(&api_url, Some(jwt.path().display().to_string()), metrics.clone());

        let err = r.resolve_repo("acme/widgets").await.err().unwrap();
        assert_eq!(
            err,
            ServiceError::NotFound(
                "Repository acme/widgets not found or inaccessible on GitHub".into()
            )
        );
        assert_eq!(stub.auth_for("repos"), vec!["Bearer ghp_test"]);
        assert!(!r.is_public_repo("acme/widgets").await);

        let text = metrics.encode().unwrap();
        assert!(!text.contains("reposcope_credential_resolutions_total{"));
    }

    #[tokio::test]
    async fn app_installation_token_is_used_when_available() {
        let stub = StubGitHub {
            has_installation: true,
            repo_visible: true,
            ..StubGitHub::default()
        };
        let api_url = serve(stub.clone()).await;
        let jwt = jwt_file();
        let metrics = MetricsRegistry::new();
        let r = resolver_for(&api_url, Some(jwt.path().display().to_string()), metrics.clone());

        let handle = r.resolve_repo("acme/widgets").await.unwrap();
        assert_eq!(handle.name(), "widgets");
        handle.list_contents("").await.unwrap();

        assert_eq!(stub.auth_for("access_tokens"), vec!["Bearer app.jwt.value"]);
        assert_eq!(stub.auth_for("repos"), vec!["Bearer ghs_installation"]);
        assert_eq!(stub.auth_for("contents"), vec!["Bearer ghs_installation"]);

        let text = metrics.encode().unwrap();
        assert!(text.contains("reposcope_credential_resolutions_total{mode=\"App\"} 1"));
        assert!(!text.contains("mode=\"Public\""));
    }

    #[tokio::test]
    async fn public_check_uses_token_pool_only() {
        let stub = StubGitHub {
            has_installation: true,
            repo_visible: true,
            ..StubGitHub::default()
        };
        let api_url = serve(stub.clone()).await;
        let r = resolver_for(&api_url, None, MetricsRegistry::new());

        assert!(r.is_public_repo("acme/widgets").await);
        assert!(stub.auth_for("installation").is_empty());
        assert_eq!(stub.auth_for("repos"), vec!["Bearer ghp_test"]);
    }

    #[tokio::test]
    async fn no_jwt_file_means_no_app_auth() {
        assert_eq!(resolver(None).app_jwt().await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_jwt_file_means_no_app_auth() {
        let r = resolver(Some("/nonexistent/reposcope/app.jwt".into()));
        assert_eq!(r.app_jwt().await.unwrap(), None);
    }

    #[tokio::test]
    async fn jwt_file_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  eyJhbGciOiJSUzI1NiJ9.payload.sig  ").unwrap();
        let r = resolver(Some(file.path().display().to_string()));
        assert_eq!(
            r.app_jwt().await.unwrap().as_deref(),
            Some("eyJhbGciOiJSUzI1NiJ9.payload.sig")
        );
    }

    #[tokio::test]
    async fn malformed_repo_name_is_not_found() {
        let err = resolver(None).resolve_repo("not-a-repo").await.err().unwrap();
        assert_eq!(
            err,
            ServiceError::NotFound(
                "Repository not-a-repo not found or inaccessible on GitHub".into()
            )
        );
    }

    #[tokio::test]
    async fn malformed_repo_name_is_not_public() {
        assert!(!resolver(None).is_public_repo("nope").await);
    }
}
