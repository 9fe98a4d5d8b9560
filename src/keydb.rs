//! Shared KeyDB pool for the structure cache and the project store.

use anyhow::{bail, Context, Result};
use fred::clients::Pool;
use fred::interfaces::ClientLike;
use fred::types::config::{Config as FredConfig, ReconnectPolicy, ServerConfig, TlsConnector};
use fred::types::Builder;

use crate::config::KeyDbConfig;

const DEFAULT_PORT: u16 = 6379;

/// Where to connect, parsed from `keydb.endpoint`.
///
/// Accepts `host`, `host:port`, and `redis://` / `rediss://` URLs with an
/// optional `/<db>` path.  A `rediss://` scheme turns TLS on even when the
/// `tls` flag is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDbEndpoint {
    pub host: String,
    pub port: u16,
    pub database: Option<u8>,
    pub tls: bool,
}

impl KeyDbEndpoint {
    pub fn parse(endpoint: &str, tls: bool) -> Result<Self> {
        let (rest, scheme_tls) = if let Some(rest) = endpoint.strip_prefix("rediss://") {
            (rest, true)
        } else if let Some(rest) = endpoint.strip_prefix("redis://") {
            (rest, false)
        } else {
            (endpoint, false)
        };

        let (authority, db) = match rest.split_once('/') {
            Some((authority, db)) => (authority, db.trim_matches('/')),
            None => (rest, ""),
        };

        let database = if db.is_empty() {
            None
        } else {
            Some(
                db.parse::<u8>()
                    .with_context(|| format!("invalid database index in endpoint: {endpoint}"))?,
            )
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .with_context(|| format!("invalid port in endpoint: {endpoint}"))?,
            ),
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            bail!("missing host in endpoint: {endpoint}");
        }

        Ok(Self {
            host: host.to_string(),
            port,
            database,
            tls: tls || scheme_tls,
        })
    }
}

/// Connect the pool and verify it with a PING.  Every connection announces
/// itself with `CLIENT SETNAME` so reposcope shows up in `CLIENT LIST`.
pub async fn create_keydb_pool(config: &KeyDbConfig) -> Result<Pool> {
    let endpoint = KeyDbEndpoint::parse(&config.endpoint, config.tls)?;

    let mut fred_config = FredConfig {
        server: ServerConfig::new_centralized(&endpoint.host, endpoint.port),
        database: endpoint.database,
        password: std::env::var(&config.auth_token_env).ok(),
        ..FredConfig::default()
    };
    if endpoint.tls {
        fred_config.tls = Some(TlsConnector::default_rustls()?.into());
    }

    let mut builder = Builder::from_config(fred_config);
    builder
        .set_policy(ReconnectPolicy::new_exponential(0, 100, 30_000, 2))
        .with_connection_config(|conn| conn.auto_client_setname = true);

    let pool = builder
        .build_pool(config.pool_size)
        .context("failed to build KeyDB connection pool")?;
    pool.init().await.context("failed to connect to KeyDB")?;

    let _: String = pool
        .ping(None)
        .await
        .context("KeyDB PING failed after connect")?;

    tracing::info!(
        host = %endpoint.host,
        port = endpoint.port,
        database = ?endpoint.database,
        tls = endpoint.tls,
        pool_size = config.pool_size,
        "KeyDB pool ready"
    );

    Ok(pool)
}
