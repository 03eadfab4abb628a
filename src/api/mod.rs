//! HTTP API module for the chat server
//!
//! This module provides HTTP endpoints for:
//! - Liveness (`GET /`)
//! - Health with live connection and room counts (`GET /api/v1/health`)
//!
//! Chat traffic itself goes over the WebSocket listener.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::AppState;

/// API version prefix
pub const API_VERSION: &str = "v1";

/// Body of the liveness route
pub const LIVENESS_BODY: &str = "Hello world !";

/// Health payload
#[derive(Debug, Serialize)]
pub struct HealthInfo {
    /// Always `"OK"` while the process serves requests
    pub status: &'static str,
    /// Server name from configuration
    pub server: String,
    /// Live connections
    pub connections: usize,
    /// Rooms with at least one member
    pub rooms: usize,
}

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new().route("/health", get(health_check));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(liveness))
        .nest(&format!("/api/{}", API_VERSION), api_routes)
        // Add CORS middleware
        .layer(cors)
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        // Add state
        .with_state(state)
}

/// CORS for the configured browser origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
}

/// Liveness endpoint
async fn liveness() -> &'static str {
    LIVENESS_BODY
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthInfo> {
    Json(HealthInfo {
        status: "OK",
        server: state.config.server_name.clone(),
        connections: state.connections.count(),
        rooms: state.rooms.room_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn test_router() -> Router {
        create_router(Arc::new(AppState::with_config(ServerConfig::default())))
    }

    #[tokio::test]
    async fn test_liveness_route() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], LIVENESS_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "OK");
        assert_eq!(value["connections"], 0);
        assert_eq!(value["rooms"], 0);
        assert_eq!(value["server"], "Chatroom");
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some(&HeaderValue::from_static("true"))
        );
    }

    #[tokio::test]
    async fn test_cors_ignores_unknown_origin() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "http://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
