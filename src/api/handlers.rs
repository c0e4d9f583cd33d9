//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::bot::BotStats;
use crate::trading::{PaperOrderService, PaperStats};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Set once the bot has completed a scan cycle.
    pub ready: Arc<AtomicBool>,
    /// Bot statistics.
    pub stats: Arc<RwLock<BotStats>>,
    /// Prometheus renderer, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Paper venue whose results are reported in the status.
    pub paper: Option<Arc<PaperOrderService>>,
}

impl AppState {
    /// Create app state with fresh statistics and no metrics recorder.
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(BotStats::default())),
            metrics: None,
            paper: None,
        }
    }

    /// Share an existing bot's ready flag and statistics.
    pub fn with_bot(ready: Arc<AtomicBool>, stats: Arc<RwLock<BotStats>>) -> Self {
        Self {
            ready,
            stats,
            metrics: None,
            paper: None,
        }
    }

    /// Attach a Prometheus renderer.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Report a paper venue's balance and ROI in the status.
    pub fn with_paper_venue(mut self, paper: Arc<PaperOrderService>) -> Self {
        self.paper = Some(paper);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
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
    /// Whether a scan cycle has completed.
    pub ready: bool,
    /// Scan cycles completed.
    pub scans: u64,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Statistics.
    pub stats: BotStats,
    /// Paper venue results, when trading on paper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper: Option<PaperStats>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let scans = state.stats.read().await.scans;

    let response = ReadyResponse {
        ready: is_ready,
        scans,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns bot status and statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.read().await.clone();
    let status = if state.is_ready() { "running" } else { "starting" };

    let paper = state.paper.as_ref().map(|p| p.statistics());

    Json(StatusResponse {
        status,
        stats,
        paper,
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_ready_toggle() {
        let state = AppState::new();
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[test]
    fn app_state_shares_bot_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let state = AppState::with_bot(flag.clone(), Arc::new(RwLock::new(BotStats::default())));

        flag.store(true, Ordering::SeqCst);
        assert!(state.is_ready());
    }
}
