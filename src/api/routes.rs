//! HTTP API route definitions.

use axum::{routing::get, Router};

use super::handlers::{health, metrics, ready, status, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Status endpoint
        .route("/api/v1/status", get(status))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::trading::PaperOrderService;

    async fn get_path(state: AppState, path: &str) -> (StatusCode, Vec<u8>) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (status, _) = get_path(AppState::new(), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_503_when_not_ready() {
        let (status, _) = get_path(AppState::new(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ready_endpoint_returns_200_when_ready() {
        let state = AppState::new();
        state.set_ready(true);

        let (status, _) = get_path(state, "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn status_endpoint_reports_stats() {
        let state = AppState::new();
        {
            let mut stats = state.stats.write().await;
            stats.scans = 7;
            stats.filled_both = 2;
        }

        let (status, body) = get_path(state, "/api/v1/status").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "starting");
        assert_eq!(json["stats"]["scans"], 7);
        assert_eq!(json["stats"]["filled_both"], 2);
    }

    #[tokio::test]
    async fn status_endpoint_reports_paper_results() {
        let paper = Arc::new(PaperOrderService::new(dec!(500)));
        let state = AppState::new().with_paper_venue(paper);

        let (_, body) = get_path(state, "/api/v1/status").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["paper"]["balance"], "500");
        assert_eq!(json["paper"]["resolved_markets"], 0);
        assert!(json["paper"]["roi"].is_null());

        let (_, body) = get_path(AppState::new(), "/api/v1/status").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("paper").is_none());
    }

    #[tokio::test]
    async fn metrics_endpoint_without_recorder_is_not_found() {
        let (status, _) = get_path(AppState::new(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
