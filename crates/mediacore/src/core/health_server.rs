//! Minimal HTTP server for liveness checks
//!
//! Exposes:
//! - `/` - JSON liveness message
//! - `/health` - JSON health check
//! - `/metrics` - Prometheus metrics in text format

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Router with every health endpoint, separated from the listener for tests
pub fn health_router() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}

/// Start the health HTTP server on 0.0.0.0:`port`
pub async fn start_health_server(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    log::info!("Starting health server on http://{}", addr);
    log::info!("  /        - Liveness message");
    log::info!("  /health  - Health check");
    log::info!("  /metrics - Prometheus metrics");

    let listener = TcpListener::bind(&addr).await?;
    serve(listener).await
}

/// Serve the health router on an already bound listener
pub async fn serve(listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    axum::serve(listener, health_router()).await?;
    Ok(())
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "message": "Bot is alive!"
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn metrics_handler() -> Response {
    match crate::core::metrics::render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {}", e)).into_response()
        }
    }
}
