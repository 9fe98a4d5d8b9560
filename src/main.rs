mod cache;
mod config;
mod credentials;
mod error;
mod forge;
mod health;
mod http;
mod keydb;
mod metrics;
mod projects;
mod structure;
#[cfg(test)]
mod test_support;
mod tree;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::credentials::{CredentialResolver, GitHubCredentialResolver, TokenPool};
use crate::forge::github::GitHubApi;
use crate::forge::rate_limit::RateLimitState;
use crate::metrics::MetricsRegistry;
use crate::structure::RepoStructureService;
use crate::tree::TreeWalker;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "reposcope", about = "Repository structure service")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "/etc/reposcope/config.yaml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Process-wide state shared by all request handlers.
pub struct AppState {
    pub config: Arc<Config>,
    /// Present when the cache or the project store lives in KeyDB.
    pub keydb: Option<fred::clients::Pool>,
    pub metrics: MetricsRegistry,
    pub http_client: reqwest::Client,
    pub resolver: Arc<dyn CredentialResolver>,
    pub structure: Arc<RepoStructureService>,
}

// ---------------------------------------------------------------------------
// HTTP server (axum)
// ---------------------------------------------------------------------------

async fn run_http_server(state: Arc<AppState>) -> Result<()> {
    let listen_addr: std::net::SocketAddr = state
        .config
        .server
        .http_listen
        .parse()
        .context("invalid http_listen address")?;

    let app = http::handler::create_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Config ----
    let config = Arc::new(config::load_config(&cli.config)?);

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(config_path = %cli.config, "starting reposcope");

    // ---- Infrastructure clients ----
    let keydb = match &config.keydb {
        Some(keydb_config) if config.needs_keydb() => {
            Some(keydb::create_keydb_pool(keydb_config).await?)
        }
        _ => None,
    };

    let http_client = reqwest::Client::builder()
        .user_agent("reposcope/0.1")
        .timeout(Duration::from_secs(config.github.request_timeout_secs))
        .build()
        .context("failed to build reqwest client")?;

    // ---- Metrics ----
    let metrics = MetricsRegistry::new();

    // ---- GitHub ----
    let tokens = Arc::new(TokenPool::from_env(&config.github.token_list_env)?);
    let api = Arc::new(GitHubApi::new(
        &config.github,
        http_client.clone(),
        RateLimitState::new(),
        metrics.clone(),
    ));
    let resolver: Arc<dyn CredentialResolver> = Arc::new(GitHubCredentialResolver::new(
        api,
        tokens,
        config.github.app_jwt_file.clone(),
        metrics.clone(),
    ));

    // ---- Structure service ----
    let cache = cache::build_cache(&config, keydb.as_ref())?;
    let projects = projects::build_project_lookup(&config, keydb.as_ref())?;
    let walker = TreeWalker::new(
        config.tree.max_depth,
        config.tree.listing_concurrency,
        metrics.clone(),
    );
    let structure = Arc::new(RepoStructureService::new(
        projects,
        Arc::clone(&resolver),
        cache,
        walker,
        config.cache.structure_ttl,
        metrics.clone(),
    ));
    tracing::info!(
        cache_backend = structure.cache_backend(),
        max_depth = config.tree.max_depth,
        listing_concurrency = config.tree.listing_concurrency,
        "structure service initialised"
    );

    // ---- App state ----
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        keydb,
        metrics,
        http_client,
        resolver,
        structure,
    });

    run_http_server(state).await?;

    tracing::info!("reposcope shut down cleanly");
    Ok(())
}
