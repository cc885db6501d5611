use axum::{Router, routing::get};
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

use crate::AppState;
use crate::handlers::{health_handler, health_live_handler, metrics_handler, websocket_handler};

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// `/ws` for the pane stream, health and metrics probes, and static files
/// from `static_dir` for everything else. Origins are not checked.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(health_live_handler))
        .route("/metrics", get(metrics_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use crate::metrics::ServerMetrics;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pane_collector::{
        Collector, CollectorConfig, ContentFingerprint, PaneIdentity, PaneInfo, SessionFilter,
        TmuxAdapter,
    };
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    /// State backed by a collector whose tmux binary does not exist, so
    /// every listing fails.
    fn test_state() -> (AppState, Collector<TmuxAdapter>) {
        let collector = Collector::new(
            TmuxAdapter::new(
                "watchtower-test-missing-tmux",
                None,
                SessionFilter::allow_all(),
            ),
            CollectorConfig::default(),
        );
        let metrics = Arc::new(ServerMetrics::new());
        let (_hub, handle) = Hub::new(
            collector.registry(),
            metrics.clone(),
            CancellationToken::new(),
        );
        let state = AppState {
            hub: handle,
            registry: collector.registry(),
            collector_stats: collector.stats(),
            metrics,
        };
        (state, collector)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_live() {
        let (state, _collector) = test_state();
        let tmp = tempfile::tempdir().unwrap();
        let (status, body) = get_json(build_router(state, tmp.path()), "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");
    }

    #[tokio::test]
    async fn test_health_healthy_counts_panes() {
        let (state, _collector) = test_state();
        state.registry.write().await.observe(
            PaneInfo {
                id: PaneIdentity::new("gt-main", "0", "0"),
                title: "zsh".to_string(),
                cols: 80,
                rows: 24,
            },
            ContentFingerprint::of("hello\n"),
        );
        let tmp = tempfile::tempdir().unwrap();

        let (status, body) = get_json(build_router(state, tmp.path()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["panes"], 1);
        assert_eq!(body["clients"], 0);
    }

    #[tokio::test]
    async fn test_health_degraded_when_listing_fails() {
        let (state, collector) = test_state();
        let report = collector.sample_once().await.unwrap();
        assert!(report.list_failed);
        let tmp = tempfile::tempdir().unwrap();

        let (_, body) = get_json(build_router(state, tmp.path()), "/health").await;
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn test_metrics_includes_collector() {
        let (state, collector) = test_state();
        collector.sample_once().await.unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let (status, body) = get_json(build_router(state, tmp.path()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collector"]["ticks"], 1);
        assert_eq!(body["collector"]["list_failures"], 1);
        assert_eq!(body["connections"]["active"], 0);
    }

    #[tokio::test]
    async fn test_static_files_served_at_root() {
        let (state, _collector) = test_state();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("index.html"), "<h1>watchtower</h1>").unwrap();

        let resp = build_router(state, tmp.path())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<h1>watchtower</h1>");
    }

    #[tokio::test]
    async fn test_unknown_static_path_is_not_found() {
        let (state, _collector) = test_state();
        let tmp = tempfile::tempdir().unwrap();

        let resp = build_router(state, tmp.path())
            .oneshot(
                Request::builder()
                    .uri("/missing.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let (state, _collector) = test_state();
        let tmp = tempfile::tempdir().unwrap();

        let resp = build_router(state, tmp.path())
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }
}
