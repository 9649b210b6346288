//! HTTP endpoints
//!
//! REST API for the search pipeline.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use parts_search_pipeline::{GradientSignal, SearchOptions};

use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/feedback", post(feedback))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .route("/admin/ranking/weights", post(update_weights))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Search request body
#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    options: SearchRequestOptions,
}

#[derive(Debug, Default, Deserialize)]
struct SearchRequestOptions {
    page: Option<usize>,
    limit: Option<usize>,
    filters: Option<serde_json::Value>,
}

/// Run one search
async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> impl IntoResponse {
    let options = SearchOptions {
        page: request.options.page,
        limit: request.options.limit,
        filters: request.options.filters,
    };
    let response = state.pipeline.search(&request.query, options).await;

    let status = if response.success {
        StatusCode::OK
    } else if response.error_code.as_deref() == Some("INVALID_QUERY") {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Feedback event from the storefront
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackRequest {
    part_id: String,
    /// 1-based result position the user interacted with
    position: usize,
    event: FeedbackEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FeedbackEvent {
    Click,
    Purchase,
}

#[derive(Debug, Serialize)]
struct FeedbackResponse {
    recorded: bool,
}

/// Record a click or purchase; feeds MRR, click-position tracking and the
/// engagement rates used by ranking
async fn feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ServerError> {
    if request.part_id.is_empty() {
        return Err(ServerError::InvalidRequest("partId must not be empty".to_string()));
    }
    if request.position == 0 {
        return Err(ServerError::InvalidRequest("position is 1-based".to_string()));
    }

    let metrics = state.pipeline.metrics();
    match request.event {
        FeedbackEvent::Click => {
            metrics.record_click(request.position);
            state.engagement.record_click(&request.part_id);
        }
        FeedbackEvent::Purchase => {
            metrics.record_purchase();
            state.engagement.record_purchase(&request.part_id);
        }
    }
    Ok(Json(FeedbackResponse { recorded: true }))
}

/// Metrics snapshot: counters, latency percentiles, quality gauges
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.pipeline.metrics().report();
    Json(serde_json::json!({
        "metrics": report,
        "cache": state.pipeline.cache_stats(),
    }))
}

/// Liveness plus breaker and cache introspection
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "breakers": state.pipeline.breaker_snapshots(),
        "cache": state.pipeline.cache_stats(),
    }))
}

/// Online weight update request
#[derive(Debug, Deserialize)]
struct WeightUpdateRequest {
    signals: Vec<GradientSignal>,
}

/// Apply gradient signals to the active ranking weights
async fn update_weights(
    State(state): State<AppState>,
    Json(request): Json<WeightUpdateRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if request.signals.is_empty() {
        return Err(ServerError::InvalidRequest("no signals provided".to_string()));
    }
    let weights = state.pipeline.ranking().apply_gradient(&request.signals);
    Ok(Json(serde_json::json!({ "weights": weights })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use parts_search_config::Settings;
    use parts_search_core::{
        EngineHit, EngineRequest, EngineResponse, Result, SearchEngine,
    };
    use parts_search_pipeline::{InMemoryEngagementProvider, SearchPipeline};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct OneHitEngine;

    #[async_trait]
    impl SearchEngine for OneHitEngine {
        async fn search(&self, _request: EngineRequest) -> Result<EngineResponse> {
            Ok(EngineResponse {
                hits: vec![EngineHit {
                    id: "p-1".into(),
                    score: 6.0,
                    source: json!({
                        "partNumber": "0451103355",
                        "brand": "Bosch",
                        "category": "oil filter",
                        "price": 8.9,
                        "stock": 3,
                    }),
                }],
                total: Some(1),
            })
        }
    }

    fn test_state() -> AppState {
        let mut settings = Settings::new();
        settings.llm.enabled = false;
        let engagement = Arc::new(InMemoryEngagementProvider::new());
        let pipeline = Arc::new(
            SearchPipeline::builder(settings)
                .with_engine(Arc::new(OneHitEngine))
                .with_engagement(engagement.clone())
                .build(),
        );
        AppState::new(pipeline, engagement)
    }

    async fn request_json(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let router = create_router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/search")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "query": "bosch oil filter" }).to_string(),
            ))
            .unwrap();

        let (status, body) = request_json(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["results"][0]["partNumber"], "0451103355");
        assert!(body["meta"]["requestId"].is_string());
    }

    #[tokio::test]
    async fn test_search_empty_query_is_400() {
        let router = create_router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/search")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "query": "  " }).to_string()))
            .unwrap();

        let (status, body) = request_json(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "INVALID_QUERY");
    }

    #[tokio::test]
    async fn test_feedback_updates_metrics() {
        let state = test_state();
        let router = create_router(state.clone());
        let request = Request::builder()
            .method("POST")
            .uri("/feedback")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "partId": "p-1", "position": 2, "event": "click" }).to_string(),
            ))
            .unwrap();

        let (status, body) = request_json(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recorded"], true);

        let report = state.pipeline.metrics().report();
        assert_eq!(report.counters.clicks, 1);
        assert!((report.quality.mrr - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_feedback_rejects_bad_position() {
        let router = create_router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/feedback")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "partId": "p-1", "position": 0, "event": "click" }).to_string(),
            ))
            .unwrap();

        let (status, body) = request_json(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("position"));
    }

    #[tokio::test]
    async fn test_weight_update_rejects_empty_signals() {
        let router = create_router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/admin/ranking/weights")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "signals": [] }).to_string()))
            .unwrap();

        let (status, body) = request_json(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("no signals"));
    }

    #[tokio::test]
    async fn test_metrics_and_health_endpoints() {
        let router = create_router(test_state());
        let (status, body) = request_json(
            router.clone(),
            Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["metrics"]["counters"]["totalSearches"].is_number());

        let (status, body) = request_json(
            router,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["breakers"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_weight_update_endpoint() {
        let router = create_router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/admin/ranking/weights")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "signals": [
                        { "feature": "clickRate", "direction": 1.0, "magnitude": 1.0 }
                    ]
                })
                .to_string(),
            ))
            .unwrap();

        let (status, body) = request_json(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["weights"]["clickRate"].as_f64().unwrap() > 0.0);
    }
}
