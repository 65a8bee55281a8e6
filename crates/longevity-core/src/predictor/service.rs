//! Prediction orchestration
//!
//! One call to [`PredictionService::predict`] resolves a model bundle,
//! queries both catalogs concurrently, reconciles their records, scores the
//! aligned row and formats the report. Every failure ends up in the
//! returned [`PredictionResult`]; nothing escapes as an error.

use super::{FeatureReconciler, InferenceEngine, InferenceStats, OutputFormatter};
use crate::error::PredictError;
use crate::health::HealthRegistry;
use crate::manager::{ModelBundle, ModelManager};
use crate::models::{AppRecord, PredictionReport, PredictionResult};
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::sources::{AppSource, AppStoreSource, PlayStoreSource, SourceConfig, SourceError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Upper bound on one catalog lookup, on top of the HTTP client timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for the prediction service
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    pub fetch_timeout: Duration,
    /// Node name attached to structured log events
    pub node_name: String,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            node_name: "local".to_string(),
        }
    }
}

/// Bundle kept between requests, with the name it was requested under
struct CachedBundle {
    requested: Option<String>,
    bundle: Arc<ModelBundle>,
}

impl CachedBundle {
    fn serves(&self, requested: Option<&str>) -> bool {
        match requested {
            None => true,
            Some(name) => {
                self.requested.as_deref() == Some(name) || self.bundle.name.as_deref() == Some(name)
            }
        }
    }
}

/// Entry point for app longevity predictions
pub struct PredictionService {
    manager: Arc<ModelManager>,
    primary: Arc<dyn AppSource>,
    secondary: Arc<dyn AppSource>,
    reconciler: FeatureReconciler,
    engine: InferenceEngine,
    formatter: OutputFormatter,
    config: PredictionConfig,
    bundle: RwLock<Option<CachedBundle>>,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl PredictionService {
    /// Create a service over explicit catalogs; `primary` wins ties
    pub fn new(
        manager: Arc<ModelManager>,
        primary: Arc<dyn AppSource>,
        secondary: Arc<dyn AppSource>,
        config: PredictionConfig,
    ) -> Self {
        let logger = StructuredLogger::new(config.node_name.clone());
        Self {
            manager,
            primary,
            secondary,
            reconciler: FeatureReconciler::new(),
            engine: InferenceEngine::new(),
            formatter: OutputFormatter::new(),
            config,
            bundle: RwLock::new(None),
            metrics: ServiceMetrics::new(),
            logger,
            health: None,
        }
    }

    /// Create a service backed by the App Store (primary) and Play Store
    pub fn with_store_sources(
        manager: Arc<ModelManager>,
        sources: &SourceConfig,
        config: PredictionConfig,
    ) -> Result<Self, SourceError> {
        let app_store = Arc::new(AppStoreSource::new(sources)?);
        let play_store = Arc::new(PlayStoreSource::new(sources)?);
        Ok(Self::new(manager, app_store, play_store, config))
    }

    /// Report model and catalog state to a health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_formatter(mut self, formatter: OutputFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Discover models and load the default bundle
    pub async fn initialize(&self) -> Result<String, PredictError> {
        let manager = self.manager.clone();
        let count =
            discovered_count(tokio::task::spawn_blocking(move || manager.discover().len()).await);
        info!(models = count, "Model registry initialized");

        let bundle = self.resolve_bundle(None).await;
        if let Err(e) = &bundle {
            warn!(error = %e, "No model available at startup");
            self.report_model(None).await;
        }
        bundle.map(|b| b.model_used().to_string())
    }

    /// Rediscover models and drop the cached bundle; returns the model count
    pub async fn reload(&self) -> usize {
        let manager = self.manager.clone();
        let count = match tokio::task::spawn_blocking(move || manager.reload().len()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Model reload task failed");
                return 0;
            }
        };
        *self.bundle.write().await = None;
        count
    }

    /// Name of the cached bundle, if any
    pub async fn current_model(&self) -> Option<String> {
        self.bundle
            .read()
            .await
            .as_ref()
            .and_then(|c| c.bundle.name.clone())
    }

    pub fn inference_stats(&self) -> InferenceStats {
        self.engine.stats()
    }

    /// Predict longevity for `app_name`.
    ///
    /// `compare_competitors` is accepted for API compatibility and ignored.
    pub async fn predict(
        &self,
        app_name: &str,
        compare_competitors: bool,
        model_name: Option<&str>,
    ) -> PredictionResult {
        let start = Instant::now();
        if compare_competitors {
            debug!(app_name = %app_name, "Competitor comparison requested, not supported");
        }

        let result = match self.run(app_name, model_name).await {
            Ok(report) => {
                self.metrics.inc_predictions_generated();
                self.logger.log_prediction(
                    app_name,
                    report.platform.as_str(),
                    report.predicted_longevity,
                    &report.longevity_interpretation.category,
                    &report.model_used,
                    start.elapsed().as_millis(),
                );
                PredictionResult::Success(Box::new(report))
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(e.kind());
                self.logger
                    .log_prediction_failure(app_name, e.kind(), &e.to_string());
                PredictionResult::failure(app_name, e.result_message())
            }
        };

        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        result
    }

    async fn run(
        &self,
        app_name: &str,
        model_name: Option<&str>,
    ) -> Result<PredictionReport, PredictError> {
        let bundle = self.resolve_bundle(model_name).await?;

        let (primary, secondary) = tokio::join!(
            self.fetch_from(self.primary.as_ref(), app_name),
            self.fetch_from(self.secondary.as_ref(), app_name),
        );

        let selection = self
            .reconciler
            .select_record(
                (self.primary.platform(), primary),
                (self.secondary.platform(), secondary),
            )
            .ok_or(PredictError::NoSourceData)?;

        let row = self.reconciler.prepare(&selection.record);
        let aligned = self.reconciler.align(&bundle, &row)?;
        debug!(stage = ?aligned.stage, columns = aligned.row.len(), "Features aligned");

        let score = self.engine.score(&bundle, &aligned)?;
        Ok(self.formatter.format(app_name, &selection, score, &bundle))
    }

    /// Cached bundle when it serves the request, otherwise a fresh load
    async fn resolve_bundle(
        &self,
        model_name: Option<&str>,
    ) -> Result<Arc<ModelBundle>, PredictError> {
        let requested = model_name.map(|n| self.manager.config().strip_extension(n).to_string());

        {
            let cached = self.bundle.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.serves(requested.as_deref()) {
                    return Ok(cached.bundle.clone());
                }
            }
        }

        let bundle = Arc::new(self.load_with_fallback(requested.clone()).await?);
        self.logger.log_model_loaded(
            bundle.model_used(),
            bundle.model.as_ref().map(|m| m.kind()).unwrap_or("none"),
            bundle.checksum.as_deref().unwrap_or("unknown"),
        );
        self.report_model(bundle.name.as_deref()).await;

        *self.bundle.write().await = Some(CachedBundle {
            requested,
            bundle: bundle.clone(),
        });
        Ok(bundle)
    }

    /// The requested model, then every registered model in order
    async fn load_with_fallback(
        &self,
        requested: Option<String>,
    ) -> Result<ModelBundle, PredictError> {
        match self.load_blocking(requested.clone()).await {
            Ok(bundle) => return Ok(bundle),
            Err(e) => warn!(requested = ?requested, error = %e, "Requested model unavailable"),
        }

        for name in self.manager.get_available_models() {
            match self.load_blocking(Some(name.clone())).await {
                Ok(bundle) => {
                    info!(model = %name, "Using fallback model");
                    return Ok(bundle);
                }
                Err(e) => debug!(model = %name, error = %e, "Fallback model failed to load"),
            }
        }
        Err(PredictError::NoModelAvailable)
    }

    async fn load_blocking(&self, name: Option<String>) -> Result<ModelBundle, PredictError> {
        let manager = self.manager.clone();
        tokio::task::spawn_blocking(move || manager.try_load(name.as_deref()))
            .await
            .map_err(|e| PredictError::model_load(format!("load task failed: {}", e)))?
    }

    /// One catalog lookup; errors and timeouts become `None`
    async fn fetch_from(&self, source: &dyn AppSource, app_name: &str) -> Option<AppRecord> {
        let platform = source.platform();
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.config.fetch_timeout, source.fetch(app_name)).await;
        self.metrics
            .observe_source_latency(platform.as_str(), start.elapsed().as_secs_f64());

        let failure = match outcome {
            Ok(Ok(record)) => {
                if let Some(health) = &self.health {
                    health.report_source(platform, None).await;
                }
                debug!(platform = %platform, found = record.is_some(), "Catalog lookup finished");
                return record;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", self.config.fetch_timeout.as_millis()),
        };

        warn!(
            platform = %platform,
            app_name = %app_name,
            error = %failure,
            "Catalog lookup failed"
        );
        self.metrics.inc_source_failures(platform.as_str());
        if let Some(health) = &self.health {
            health.report_source(platform, Some(&failure)).await;
        }
        None
    }

    async fn report_model(&self, loaded: Option<&str>) {
        if let Some(health) = &self.health {
            health.report_model(loaded).await;
        }
    }
}

/// Model count from the discovery task; a failed task counts as zero
fn discovered_count(joined: Result<usize, tokio::task::JoinError>) -> usize {
    match joined {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Model discovery task failed");
            0
        }
    }
}
