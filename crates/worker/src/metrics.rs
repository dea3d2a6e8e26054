//! Prometheus metrics endpoint.
//!
//! Serves the core metrics on `GET /metrics` and a liveness probe on
//! `GET /health`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{http::header, response::IntoResponse, routing::get, Json, Router};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use serde::Serialize;
use tracing::info;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// 1 while the Pulse consumer is running.
pub static CONSUMER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "aurora_consumer_running",
        "Whether the Pulse consumer is running (1) or not (0)",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONSUMER_RUNNING.clone()))
        .unwrap();

    for metric in aurora_publisher_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

/// Serve the metrics endpoint until the task is aborted.
pub async fn serve(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint on {}", addr))?;

    info!("Metrics endpoint listening on {}", addr);
    axum::serve(listener, router())
        .await
        .context("Metrics endpoint failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        CONSUMER_RUNNING.set(1);
        aurora_publisher_core::metrics::record_message("published");

        let output = encode_metrics();
        assert!(output.contains("aurora_consumer_running"));
        assert!(output.contains("aurora_messages_processed_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        aurora_publisher_core::metrics::record_task_created();
        aurora_publisher_core::metrics::record_external_request("treeherder", "success");
        aurora_publisher_core::metrics::observe_publish(
            "published",
            std::time::Duration::from_millis(5),
        );

        let output = encode_metrics();
        assert!(output.contains("aurora_tasks_created_total"));
        assert!(output.contains("aurora_external_requests_total"));
        assert!(output.contains("aurora_publish_duration_seconds"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let Json(response) = health().await;
        assert_eq!(response.status, "ok");
    }
}
