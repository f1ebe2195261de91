//! Status and Snapshot Endpoint
//!
//! HTTP endpoint for health checks, Prometheus metrics and read access to the
//! current instrument snapshots.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (feed must be open)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /snapshots` - All snapshots, sorted by symbol
//! - `GET /snapshots/{symbol}` - One snapshot, 404 if untracked

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{SnapshotSync, SyncStats};
use crate::domain::snapshot::EntitySnapshot;
use crate::infrastructure::feed::{ConnectionState, FeedState, FeedStats};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Feed state and counters.
    pub feed: FeedStats,
    /// Number of tracked instruments.
    pub entities: usize,
    /// Merge counters.
    pub merges: SyncStats,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Feed open and delivering.
    Healthy,
    /// Feed not open yet or retrying; snapshots may be stale.
    Degraded,
    /// Feed closed; snapshots will not change.
    Unhealthy,
}

impl From<ConnectionState> for HealthStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Open => Self::Healthy,
            ConnectionState::Idle | ConnectionState::Connecting | ConnectionState::Reconnecting => {
                Self::Degraded
            }
            ConnectionState::Closed => Self::Unhealthy,
        }
    }
}

// =============================================================================
// Status Server State
// =============================================================================

/// Shared state for the status server.
#[derive(Debug)]
pub struct StatusServerState {
    version: String,
    started_at: Instant,
    sync: Arc<SnapshotSync>,
    feed: Arc<FeedState>,
}

impl StatusServerState {
    /// Create new status server state.
    #[must_use]
    pub fn new(version: impl Into<String>, sync: Arc<SnapshotSync>, feed: Arc<FeedState>) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            sync,
            feed,
        }
    }
}

// =============================================================================
// Status Server
// =============================================================================

/// Status HTTP server.
pub struct StatusServer {
    port: u16,
    state: Arc<StatusServerState>,
    cancel: CancellationToken,
}

impl StatusServer {
    /// Create a new status server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<StatusServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the status server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `StatusServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), StatusServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StatusServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Status server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| StatusServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Status server stopped");
        Ok(())
    }
}

/// Build the status router.
#[must_use]
pub fn router(state: Arc<StatusServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/snapshots", get(snapshots_handler))
        .route("/snapshots/{symbol}", get(snapshot_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    if state.feed.connection() == ConnectionState::Open {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn snapshots_handler(
    State(state): State<Arc<StatusServerState>>,
) -> Json<Vec<EntitySnapshot>> {
    Json(state.sync.store().get_all())
}

async fn snapshot_handler(
    State(state): State<Arc<StatusServerState>>,
    Path(symbol): Path<String>,
) -> Response {
    state.sync.store().get(&symbol).map_or_else(
        || (StatusCode::NOT_FOUND, format!("unknown symbol: {symbol}")).into_response(),
        |snapshot| Json(snapshot).into_response(),
    )
}

fn build_health_response(state: &StatusServerState) -> HealthResponse {
    let feed = state.feed.stats();

    HealthResponse {
        status: HealthStatus::from(feed.state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        entities: state.sync.store().len(),
        merges: state.sync.stats(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Status server errors.
#[derive(Debug, thiserror::Error)]
pub enum StatusServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
