//! HTTP API over the cache coordinator.
//!
//! Thin mapping of the coordinator's contract:
//! - GET  /v1/records/{category}/{id}   (query: detail, timeout_ms)
//! - GET  /v1/cache/stats
//! - POST /v1/admin/reload
//! - POST /v1/admin/clear               (query: tier)
//! - GET  /health
//! - GET  /metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::cache::coordinator::{CacheCoordinator, CacheError, CacheStats, ClearTarget};
use crate::cache::record::{BasicRecord, CacheKey, DetailLevel, Record};
use crate::cache::store::LoadReport;
use crate::config::Config;
use crate::server::metrics::CacheMetrics;

/// Application state shared across handlers.
pub struct AppState {
    pub coordinator: Arc<CacheCoordinator>,
    pub config: Arc<Config>,
    pub metrics: CacheMetrics,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/records/{category}/{id}", get(get_record))
        .route("/v1/cache/stats", get(cache_stats))
        .route("/v1/admin/reload", post(reload))
        .route("/v1/admin/clear", post(clear))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    /// Requested detail level; defaults to basic.
    pub detail: Option<DetailLevel>,
    /// Per-call generation deadline in milliseconds.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub request_id: String,
    pub tier: String,
    pub record: Record,
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    /// "basic", "promoted", or "all" (default).
    pub tier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wraps coordinator errors for HTTP status mapping.
pub struct ApiError(CacheError);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        Self(err)
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((category, id)): Path<(String, u64)>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<RecordResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let key = CacheKey::new(category, id);
    let level = query.detail.unwrap_or(DetailLevel::Basic);
    let deadline = query.timeout_ms.map(Duration::from_millis);

    info!(
        request_id = request_id,
        key = %key,
        level = ?level,
        "record lookup"
    );

    let lookup = state.coordinator.get(&key, level, deadline).await?;

    Ok(Json(RecordResponse {
        request_id,
        tier: lookup.tier.to_string(),
        record: lookup.record,
    }))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.coordinator.stats().await)
}

async fn reload(
    State(state): State<Arc<AppState>>,
    Json(records): Json<Vec<BasicRecord>>,
) -> Result<Json<LoadReport>, ApiError> {
    info!(records = records.len(), "admin reload");
    let report = state.coordinator.reload(records).await?;
    Ok(Json(report))
}

async fn clear(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<ClearResponse>, (StatusCode, Json<ErrorResponse>)> {
    let target = match query.tier.as_deref() {
        None => ClearTarget::All,
        Some(raw) => raw.parse::<ClearTarget>().map_err(|err| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: err }),
            )
        })?,
    };

    info!(?target, "admin clear");
    state.coordinator.clear(target).await;

    Ok(Json(ClearResponse {
        cleared: format!("{target:?}").to_lowercase(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cache: state.coordinator.stats().await,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.coordinator.stats().await;
    state.metrics.update(&stats);

    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {err}"),
        ),
    }
}
