//! Health and metrics HTTP server.
//!
//! Uses `axum` for routing; every handler is read-only and works from a
//! point-in-time snapshot, so requests never block the scheduler.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /`, `GET /health` | component health, 200 if overall healthy else 500 |
//! | `GET /health/summary` | detailed per-component health, always 200 |
//! | `GET /metrics` | Prometheus text exposition |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::health::{Component, HealthAggregator, HealthSnapshot};
use crate::core::metrics::MetricsRegistry;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub health: Arc<HealthAggregator>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub source: bool,
    pub notifier: bool,
    pub overall: bool,
    pub timestamp: String,
}

/// Per-component entry of `GET /health/summary`
#[derive(Debug, Serialize)]
pub struct ComponentCheck {
    pub healthy: bool,
    pub last_transition: Option<DateTime<Utc>>,
    pub transitions: u64,
}

/// Body of `GET /health/summary`
#[derive(Debug, Serialize)]
pub struct HealthSummaryResponse {
    pub overall_status: &'static str,
    pub timestamp: String,
    pub checks: BTreeMap<Component, ComponentCheck>,
    pub healthy_count: usize,
    pub total_count: usize,
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&HealthSnapshot> for HealthResponse {
    fn from(snapshot: &HealthSnapshot) -> Self {
        Self {
            source: snapshot.is_healthy(Component::Source),
            notifier: snapshot.is_healthy(Component::Notifier),
            overall: snapshot.overall,
            timestamp: rfc3339(snapshot.timestamp),
        }
    }
}

impl From<&HealthSnapshot> for HealthSummaryResponse {
    fn from(snapshot: &HealthSnapshot) -> Self {
        let checks = snapshot
            .components
            .iter()
            .map(|(component, status)| {
                (
                    *component,
                    ComponentCheck {
                        healthy: status.healthy,
                        last_transition: status.last_transition,
                        transitions: status.transitions,
                    },
                )
            })
            .collect();

        Self {
            overall_status: if snapshot.overall { "healthy" } else { "unhealthy" },
            timestamp: rfc3339(snapshot.timestamp),
            checks,
            healthy_count: snapshot.healthy_count(),
            total_count: snapshot.total_count(),
        }
    }
}

/// Build the router (separate from `start_server` for testing)
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/health/summary", get(health_summary_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on `addr`.
///
/// Runs until `cancel` fires, then drains in-flight requests.
pub async fn start_server(state: AppState, addr: &str, cancel: CancellationToken) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "[SERVER] Health and metrics server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("[SERVER] Stopped");
    Ok(())
}

/// GET / and GET /health
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.health.snapshot().await;
    let status = if snapshot.overall {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(HealthResponse::from(&snapshot)))
}

/// GET /health/summary
async fn health_summary_handler(State(state): State<AppState>) -> Json<HealthSummaryResponse> {
    let snapshot = state.health.snapshot().await;
    Json(HealthSummaryResponse::from(&snapshot))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.health.while_stable(|| state.metrics.encode()).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "[SERVER] Metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
