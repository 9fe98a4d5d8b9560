use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fred::interfaces::ClientLike;
use serde::Serialize;

use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub keydb: CheckResult,
    pub github: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    fn healthy_with(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: Some(detail.into()),
        }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

async fn check_keydb(pool: Option<&fred::clients::Pool>) -> CheckResult {
    let Some(pool) = pool else {
        return CheckResult::healthy_with("not configured");
    };
    match pool.ping::<String>(None).await {
        Ok(_) => CheckResult::healthy(),
        Err(e) => CheckResult::unhealthy(format!("PING failed: {e}")),
    }
}

async fn check_github(client: &reqwest::Client, api_url: &str) -> CheckResult {
    let url = format!("{}/meta", api_url.trim_end_matches('/'));
    match client.head(&url).send().await {
        Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
            CheckResult::healthy()
        }
        Ok(resp) => CheckResult::unhealthy(format!("HEAD {url} returned {}", resp.status())),
        Err(e) => CheckResult::unhealthy(format!("HEAD {url} failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

/// KeyDB backs both the cache and project records, so losing it is fatal;
/// GitHub being unreachable still lets cached outlines be served.
fn aggregate_status(checks: &HealthChecks) -> HealthStatus {
    if !checks.keydb.ok {
        HealthStatus::Unhealthy
    } else if !checks.github.ok {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Axum handler
// ---------------------------------------------------------------------------

/// `GET /healthz`.  Returns 200 on Ok/Degraded, 503 on Unhealthy.
pub async fn health_handler(state: Arc<AppState>) -> impl IntoResponse {
    let (keydb, github) = tokio::join!(
        check_keydb(state.keydb.as_ref()),
        check_github(&state.http_client, &state.config.github.api_url),
    );

    let checks = HealthChecks { keydb, github };
    let status = aggregate_status(&checks);
    let body = HealthResponse { status, checks };

    let http_status = match status {
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(body))
}
