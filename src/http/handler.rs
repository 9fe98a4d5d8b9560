//! axum router and request handlers.
//!
//! Routes:
//! - `GET /projects/{project_id}/structure?path=` - Indented repository outline
//! - `GET /repos/{owner}/{repo}/public`          - Public accessibility check
//! - `GET /healthz`                              - Health check
//! - `GET /metrics`                              - Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::error::ServiceError;
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/projects/{project_id}/structure", get(handle_structure))
        .route("/repos/{owner}/{repo}/public", get(handle_public_repo))
        .route("/healthz", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StructureQuery {
    path: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublicRepoResponse {
    repository: String,
    public: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /projects/{project_id}/structure?path=<scope>`
#[instrument(skip(state))]
async fn handle_structure(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Query(query): Query<StructureQuery>,
) -> Result<Response, ServiceError> {
    let outline = state
        .structure
        .get_project_structure(&project_id, query.path.as_deref())
        .await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        outline,
    )
        .into_response())
}

/// `GET /repos/{owner}/{repo}/public`
#[instrument(skip(state))]
async fn handle_public_repo(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Json<PublicRepoResponse> {
    let repository = format!("{owner}/{repo}");
    let public = state.resolver.is_public_repo(&repository).await;
    Json(PublicRepoResponse { repository, public })
}

/// `GET /healthz`
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    crate::health::health_handler(state).await
}

/// `GET /metrics`
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    metrics_response(state.metrics.encode())
}

fn metrics_response(encoded: anyhow::Result<String>) -> Response {
    match encoded {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
