//! HTTP API for health checks, Prometheus metrics and the model registry

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use longevity_core::{
    health::{ComponentStatus, HealthRegistry},
    observability::ServiceMetrics,
    predictor::PredictionService,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub service: Arc<PredictionService>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        service: Arc<PredictionService>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            service,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        // A catalog outage still allows predictions from the other one
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Registry listing in discovery order
async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let loaded = state.service.current_model().await;
    let manager = state.service.manager();
    let registry = manager.registry();
    let models: Vec<_> = registry.iter().collect();

    Json(json!({
        "models": models,
        "default_model": manager.config().default_name(),
        "loaded_model": loaded,
    }))
}

/// One registry entry; unknown names are 404 with an empty mapping
async fn model_info(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.service.manager().get_model_info(Some(&name)) {
        Some(entry) => (StatusCode::OK, Json(json!(entry))),
        None => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

/// Rediscover artifacts; the next prediction reloads its bundle
async fn reload_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let count = state.service.reload().await;
    info!(models = count, "Model registry reloaded via API");
    Json(json!({ "models": count }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/models", get(list_models))
        .route("/models/reload", post(reload_models))
        .route("/models/:name", get(model_info))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
