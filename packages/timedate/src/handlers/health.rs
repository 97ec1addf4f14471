use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::models::{HealthResponse, ServiceInfo};

pub const SERVICE_NAME: &str = "TimeDate API";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Root endpoint - service identification
pub async fn root_handler() -> impl IntoResponse {
    Json(ServiceInfo {
        name: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        description: "API for time operations and WebSockets".to_string(),
    })
}

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: SERVICE_VERSION.to_string(),
        uptime_secs: metrics.uptime_secs,
        connections: metrics.connections.active,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> serde_json::Value {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn test_router() -> (Router, crate::AppState) {
        let state = crate::test_helpers::test_app_state(&[]);
        let router = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state.clone());
        (router, state)
    }

    #[tokio::test]
    async fn test_root_info() {
        let (app, _) = test_router();
        let json = get_json(app, "/").await;
        assert_eq!(json["name"], "TimeDate API");
        assert_eq!(json["version"], SERVICE_VERSION);
    }

    #[tokio::test]
    async fn test_health_reports_connections() {
        let (app, state) = test_router();
        state.metrics.connection_opened();
        let json = get_json(app, "/health").await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["connections"], 1);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let (app, state) = test_router();
        state.metrics.upgrade_rejected();
        let json = get_json(app, "/metrics").await;
        assert_eq!(json["connections"]["rejected"], 1);
        assert_eq!(json["closes"]["peer"], 0);
    }
}
