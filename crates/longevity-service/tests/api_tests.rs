//! Integration tests for the service API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use longevity_core::{
    health::{components, HealthRegistry},
    manager::{ModelManager, ModelManagerConfig},
    models::{AppRecord, Platform},
    observability::ServiceMetrics,
    predictor::{PredictionConfig, PredictionService},
    sources::{AppSource, SourceError},
};
use longevity_service::api::{create_router, AppState};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Catalog that never finds anything
struct EmptySource(Platform);

#[async_trait]
impl AppSource for EmptySource {
    fn platform(&self) -> Platform {
        self.0
    }

    async fn fetch(&self, _app_name: &str) -> Result<Option<AppRecord>, SourceError> {
        Ok(None)
    }
}

const MODEL: &str = r#"{
    "kind": "linear_regression",
    "feature_names": ["rating"],
    "coefficients": [0.1],
    "intercept": 0.2
}"#;

async fn setup_test_app(temp: &TempDir) -> (Router, Arc<AppState>) {
    let models = temp.path().join("models");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(models.join("rf_model.model"), MODEL).unwrap();
    std::fs::write(models.join("scaler.model"), MODEL).unwrap();

    let health_registry = HealthRegistry::new();
    health_registry.register_defaults().await;

    let manager = Arc::new(ModelManager::new(ModelManagerConfig {
        base_dir: temp.path().to_path_buf(),
        model_path: "models".into(),
        ..Default::default()
    }));
    manager.discover();

    let service = PredictionService::new(
        manager,
        Arc::new(EmptySource(Platform::Ios)),
        Arc::new(EmptySource(Platform::Android)),
        PredictionConfig::default(),
    )
    .with_health(health_registry.clone());

    let state = Arc::new(AppState::new(
        health_registry,
        ServiceMetrics::new(),
        Arc::new(service),
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let temp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&temp).await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["model_manager"].is_object());
    assert!(health["components"]["app_store"].is_object());
    assert!(health["components"]["play_store"].is_object());
}

#[tokio::test]
async fn test_catalog_outage_is_degraded_but_ok() {
    let temp = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&temp).await;

    state
        .health_registry
        .report_source(Platform::Android, Some("timed out after 15000ms"))
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["play_store"]["status"], "degraded");
}

#[tokio::test]
async fn test_missing_model_is_unhealthy() {
    let temp = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&temp).await;

    state.health_registry.report_model(None).await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let temp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&temp).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let temp = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&temp).await;

    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let temp = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&temp).await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::MODEL_MANAGER, "No prediction model loaded")
        .await;

    let (status, _) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let temp = TempDir::new().unwrap();
    let (app, state) = setup_test_app(&temp).await;

    state.metrics.observe_prediction_latency(0.2);
    state.metrics.observe_source_latency("iOS", 0.1);
    state.metrics.set_models_discovered(1);
    state.metrics.set_model_info("rf_model", "linear_regression");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("longevity_prediction_latency_seconds_bucket"));
    assert!(metrics_text.contains("longevity_source_latency_seconds"));
    assert!(metrics_text.contains("longevity_models_discovered"));
    assert!(metrics_text.contains("longevity_model_info"));
}

#[tokio::test]
async fn test_models_lists_registry_without_companions() {
    let temp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&temp).await;

    let (status, body) = get_json(app, "/models").await;

    assert_eq!(status, StatusCode::OK);
    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["name"], "rf_model");
    assert_eq!(models[0]["model_type"], "rf");
    assert_eq!(body["default_model"], "rf_model");
    assert!(body["loaded_model"].is_null());
}

#[tokio::test]
async fn test_model_info_found_and_missing() {
    let temp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&temp).await;

    let (status, entry) = get_json(app.clone(), "/models/rf_model.model").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["file_name"], "rf_model.model");

    let (status, entry) = get_json(app, "/models/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(entry, serde_json::json!({}));
}

#[tokio::test]
async fn test_reload_rediscovers_models() {
    let temp = TempDir::new().unwrap();
    let (app, _state) = setup_test_app(&temp).await;
    std::fs::write(temp.path().join("models").join("gb_model.model"), MODEL).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/models/reload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["models"], 2);
}
