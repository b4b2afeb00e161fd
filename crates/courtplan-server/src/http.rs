// HTTP surface: `POST /optimize` and `GET /health`.
//
// The optimizer is CPU-bound and synchronous, so each request runs it on the
// blocking pool under the configured time budget. The snapshot fetch happens
// first and is not counted against that budget.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use courtplan_core::config::Config;
use courtplan_core::protocol::{OptimizationResult, OptimizeQuery, OptimizeRequest};
use courtplan_core::{optimize, OptimizeError};

use crate::source::CatalogSource;

pub struct AppState {
    pub config: Config,
    pub source: Arc<dyn CatalogSource>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/optimize", post(optimize_squad))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    /// The catalog snapshot could not be fetched.
    #[error("upstream fetch failed: {0:#}")]
    Upstream(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Optimize(OptimizeError::Validation { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Optimize(OptimizeError::Infeasible { .. })
            | ApiError::Optimize(OptimizeError::InsufficientBudget { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Optimize(OptimizeError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation",
            ApiError::Optimize(e) => e.kind(),
            ApiError::Upstream(_) => "upstream",
            ApiError::Internal(_) => "internal",
        }
    }

    fn stage(&self) -> Option<&'static str> {
        match self {
            ApiError::BadRequest(_) => Some("request"),
            ApiError::Optimize(e) => e.stage().map(|s| s.as_str()),
            ApiError::Upstream(_) | ApiError::Internal(_) => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "optimize request failed");
        } else {
            warn!(error = %self, "optimize request rejected");
        }

        let body = Json(json!({
            "error": self.kind(),
            "stage": self.stage(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn optimize_squad(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OptimizeQuery>, QueryRejection>,
    body: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Result<Json<OptimizationResult>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let metric = query.metric(&request);

    let snapshot = state.source.snapshot().await.map_err(ApiError::Upstream)?;

    let rules = state.config.league.clone();
    let limit = state.config.server.optimize_timeout();
    let task = tokio::task::spawn_blocking(move || optimize(&snapshot, &request, metric, &rules));

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => Ok(Json(result?)),
        Ok(Err(join)) => Err(ApiError::Internal(format!("optimizer task failed: {join}"))),
        Err(_) => Err(OptimizeError::Timeout { limit }.into()),
    }
}
