use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GithubConfig,
    /// Required when either the cache backend or the project source is KeyDB.
    #[serde(default)]
    pub keydb: Option<KeyDbConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub projects: ProjectsConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:8080`).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
        }
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:8080".to_string()
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// Full URL to the API root (e.g. `https://api.github.com`).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// File holding a GitHub App JWT, kept fresh by an external signer.
    ///
    /// Read on every repository resolution.  When unset, missing, or empty
    /// the installation path is skipped and only the public token pool is
    /// used.
    #[serde(default)]
    pub app_jwt_file: Option<String>,
    /// Name of the environment variable holding the comma-separated list of
    /// fallback personal access tokens.
    #[serde(default = "default_token_list_env")]
    pub token_list_env: String,
    /// Value of the `X-GitHub-Api-Version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Per-request timeout for upstream API calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            app_jwt_file: None,
            token_list_env: default_token_list_env(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_list_env() -> String {
    "GH_TOKEN_LIST".to_string()
}

fn default_api_version() -> String {
    "2022-11-28".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// KeyDB / Redis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KeyDbConfig {
    /// Connection string (e.g. `rediss://keydb.local:6380`).
    pub endpoint: String,
    /// Enable TLS for the KeyDB connection.
    #[serde(default)]
    pub tls: bool,
    /// Name of the environment variable that holds the KeyDB auth token.
    #[serde(default = "default_keydb_auth_env")]
    pub auth_token_env: String,
    #[serde(default = "default_keydb_pool_size")]
    pub pool_size: usize,
}

fn default_keydb_auth_env() -> String {
    "KEYDB_AUTH_TOKEN".to_string()
}

fn default_keydb_pool_size() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Structure cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Shared KeyDB instance; entries survive restarts and are visible to
    /// every replica.
    #[default]
    Keydb,
    /// Process-local map.  Intended for development and single-node runs.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// TTL of a cached structure outline, in seconds.
    #[serde(default = "default_structure_ttl")]
    pub structure_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            structure_ttl: default_structure_ttl(),
        }
    }
}

fn default_structure_ttl() -> u64 {
    3600
}

// ---------------------------------------------------------------------------
// Tree walk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
    /// Directories at this depth (relative to the walk root) are not listed.
    /// Part of every cache key.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of contents listings in flight across the process.
    #[serde(default = "default_listing_concurrency")]
    pub listing_concurrency: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            listing_concurrency: default_listing_concurrency(),
        }
    }
}

fn default_max_depth() -> usize {
    4
}

fn default_listing_concurrency() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Project records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSource {
    #[default]
    Keydb,
    Static,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectsConfig {
    #[serde(default)]
    pub source: ProjectSource,
    /// `project id -> owner/repo`, used when `source` is `static`.
    #[serde(default)]
    pub entries: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

impl Config {
    pub fn needs_keydb(&self) -> bool {
        self.cache.backend == CacheBackend::Keydb || self.projects.source == ProjectSource::Keydb
    }
}

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(config.tree.max_depth >= 1, "tree.max_depth must be at least 1");
    anyhow::ensure!(
        config.tree.listing_concurrency >= 1,
        "tree.listing_concurrency must be at least 1"
    );
    anyhow::ensure!(
        config.cache.structure_ttl > 0,
        "cache.structure_ttl must be greater than 0"
    );
    anyhow::ensure!(
        !config.needs_keydb() || config.keydb.is_some(),
        "a keydb section is required when cache.backend or projects.source is keydb"
    );
    if let Some(keydb) = &config.keydb {
        anyhow::ensure!(keydb.pool_size >= 1, "keydb.pool_size must be at least 1");
    }
    Ok(())
}
