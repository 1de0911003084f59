//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::controller::TickReport;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether at least one tick has completed.
    pub ready: Arc<std::sync::atomic::AtomicBool>,
    /// Summary of the most recent tick.
    pub last_tick: Arc<tokio::sync::RwLock<Option<TickSummary>>>,
    /// Prometheus render handle, when the exporter is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            last_tick: Arc::new(tokio::sync::RwLock::new(None)),
            prometheus,
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready
            .store(ready, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Record the outcome of a tick.
    pub async fn record_tick(&self, report: &TickReport) {
        *self.last_tick.write().await = Some(TickSummary::from_report(report));
        self.set_ready(true);
    }
}

/// Serializable summary of one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickSummary {
    /// When the tick finished (RFC 3339).
    pub finished_at: String,
    /// Currencies processed successfully.
    pub currencies_ok: usize,
    /// Currencies that failed.
    pub currencies_failed: usize,
    /// Offers submitted.
    pub offers_submitted: u32,
    /// Offers canceled.
    pub offers_canceled: u32,
}

impl TickSummary {
    /// Build a summary from a tick report.
    pub fn from_report(report: &TickReport) -> Self {
        Self {
            finished_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            currencies_ok: report.completed.len(),
            currencies_failed: report.failures.len(),
            offers_submitted: report.offers_submitted(),
            offers_canceled: report.offers_canceled(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether at least one tick has completed.
    pub ready: bool,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Most recent tick, if any.
    pub last_tick: Option<TickSummary>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 once a tick has run, 503 before.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse { ready: is_ready };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns bot status and the last tick summary.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let last_tick = state.last_tick.read().await.clone();
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse { status, last_tick })
}

/// Prometheus metrics handler.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}
