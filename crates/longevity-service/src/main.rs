//! Longevity service - app longevity prediction
//!
//! Builds the model manager and prediction service once, loads the default
//! model, then serves health, metrics and registry endpoints until Ctrl-C.

use anyhow::{Context, Result};
use longevity_core::{
    health::HealthRegistry,
    manager::ModelManager,
    observability::{ServiceMetrics, StructuredLogger},
    predictor::PredictionService,
};
use longevity_service::{api, config};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting longevity-service");

    let config = config::ServiceConfig::load()?;
    info!(
        node_name = %config.node_name,
        model_path = %config.model_path,
        default_model = %config.default_model,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_defaults().await;

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let manager = Arc::new(ModelManager::new(config.manager_config()));
    let service = PredictionService::with_store_sources(
        manager.clone(),
        &config.source_config(),
        config.prediction_config(),
    )
    .context("Failed to build catalog clients")?
    .with_health(health_registry.clone());
    let service = Arc::new(service);

    match service.initialize().await {
        Ok(model) => info!(model = %model, "Default model loaded"),
        Err(e) => warn!(error = %e, "Starting without a usable model"),
    }
    logger.log_startup(SERVICE_VERSION, manager.get_available_models().len());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        service.clone(),
    ));

    // Ready once startup loading has finished, whatever its outcome
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => {
                    logger.log_shutdown("API server failed");
                    return Err(e);
                }
                Err(e) => return Err(e).context("API server task panicked"),
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
