//! End-to-end tests for the prediction service
//!
//! Catalogs are replaced by in-memory sources and models are small JSON
//! documents written to temp dirs.

#[cfg(test)]
mod service_tests {
    use crate::health::{components, ComponentStatus, HealthRegistry};
    use crate::manager::{ModelManager, ModelManagerConfig};
    use crate::models::{AppRecord, Platform, PredictionResult};
    use crate::predictor::{PredictionConfig, PredictionService};
    use crate::sources::{AppSource, SourceError};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// What a test catalog does when asked
    enum Behavior {
        Found(AppRecord),
        NotFound,
        Fails,
        Hangs,
    }

    struct StaticSource {
        platform: Platform,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(platform: Platform, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                platform,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AppSource for StaticSource {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn fetch(&self, _app_name: &str) -> Result<Option<AppRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Found(record) => Ok(Some(record.clone())),
                Behavior::NotFound => Ok(None),
                Behavior::Fails => Err(SourceError::Status(500)),
                Behavior::Hangs => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(None)
                }
            }
        }
    }

    fn healthy_record() -> AppRecord {
        AppRecord::new()
            .with("app_name", "Notes")
            .with("app_id", "987")
            .with("rating", 4.6)
            .with("total_ratings", 50000.0)
            .with("days_since_last_update", 10.0)
            .with("positive_sentiment_ratio", 0.9)
    }

    /// Constant model: zero weights, intercept is the score
    fn constant_model(score: f64) -> String {
        format!(
            r#"{{
                "kind": "linear_regression",
                "feature_names": [
                    "rating",
                    "total_ratings",
                    "days_since_last_update",
                    "positive_sentiment_ratio"
                ],
                "coefficients": [0.0, 0.0, 0.0, 0.0],
                "intercept": {}
            }}"#,
            score
        )
    }

    fn manager_with(temp: &TempDir, files: &[(&str, String)]) -> Arc<ModelManager> {
        let models = temp.path().join("models");
        fs::create_dir_all(&models).unwrap();
        for (name, content) in files {
            fs::write(models.join(name), content).unwrap();
        }
        let manager = ModelManager::new(ModelManagerConfig {
            base_dir: temp.path().to_path_buf(),
            model_path: "models".into(),
            ..Default::default()
        });
        manager.discover();
        Arc::new(manager)
    }

    fn service(
        manager: Arc<ModelManager>,
        primary: Arc<StaticSource>,
        secondary: Arc<StaticSource>,
    ) -> PredictionService {
        PredictionService::new(
            manager,
            primary,
            secondary,
            PredictionConfig {
                fetch_timeout: Duration::from_millis(200),
                node_name: "test".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_excellent_app_end_to_end() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(&temp, &[("rf_model.model", constant_model(0.85))]);
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::Found(healthy_record())),
            StaticSource::new(Platform::Android, Behavior::NotFound),
        );

        let result = service.predict("Notes", false, None).await;

        let report = result.report().expect("prediction should succeed");
        assert_eq!(report.platform, Platform::Ios);
        assert_eq!(report.store_id.as_deref(), Some("987"));
        assert!((report.predicted_longevity - 0.85).abs() < 1e-9);
        assert_eq!(report.longevity_interpretation.category, "Excellent");
        assert_eq!(report.longevity_interpretation.expected_lifespan, "5+ years");
        assert_eq!(report.model_used, "rf_model");
        assert!(report.recommendations.len() >= 2);
        assert!(report
            .recommendations
            .iter()
            .all(|r| r.issue != "Infrequent updates"));
    }

    #[tokio::test]
    async fn test_no_source_data_is_bare_error() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(&temp, &[("rf_model.model", constant_model(0.5))]);
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::NotFound),
            StaticSource::new(Platform::Android, Behavior::NotFound),
        );

        let result = service.predict("Ghost App", false, None).await;

        let json = serde_json::to_value(&result).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["app_name"], "Ghost App");
        assert_eq!(
            object["error"],
            "Could not find sufficient data for this app on either platform"
        );
        assert!(result.persistence_record().is_none());
    }

    #[tokio::test]
    async fn test_empty_registry_reports_missing_model() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(&temp, &[]);
        let primary = StaticSource::new(Platform::Ios, Behavior::Found(healthy_record()));
        let service = service(
            manager,
            primary.clone(),
            StaticSource::new(Platform::Android, Behavior::NotFound),
        );

        let result = service.predict("Notes", false, None).await;

        assert!(result.error().unwrap().contains("model available"));
        // No model means no reason to hit the catalogs
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_and_hanging_sources_are_absent() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(&temp, &[("rf_model.model", constant_model(0.3))]);
        let health = HealthRegistry::new();
        health.register_defaults().await;
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::Hangs),
            StaticSource::new(Platform::Android, Behavior::Fails),
        )
        .with_health(health.clone());

        let result = service.predict("Notes", false, None).await;

        assert!(result.error().unwrap().contains("sufficient data"));
        let status = health.health().await;
        assert_eq!(
            status.components[components::APP_STORE].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            status.components[components::PLAY_STORE].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_secondary_used_when_primary_fails() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(&temp, &[("rf_model.model", constant_model(0.65))]);
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::Fails),
            StaticSource::new(Platform::Android, Behavior::Found(healthy_record())),
        );

        let result = service.predict("Notes", true, None).await;

        let report = result.report().unwrap();
        assert_eq!(report.platform, Platform::Android);
        assert_eq!(report.longevity_interpretation.category, "Good");
        assert!(result.persistence_record().is_some());
    }

    #[tokio::test]
    async fn test_bundle_cached_until_other_model_requested() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(
            &temp,
            &[
                ("rf_model.model", constant_model(0.85)),
                ("lr_model.model", constant_model(0.1)),
            ],
        );
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::Found(healthy_record())),
            StaticSource::new(Platform::Android, Behavior::NotFound),
        );

        assert_eq!(service.initialize().await.unwrap(), "rf_model");
        assert_eq!(service.current_model().await.as_deref(), Some("rf_model"));

        let other = service.predict("Notes", false, Some("lr_model.model")).await;
        assert_eq!(other.report().unwrap().model_used, "lr_model");
        assert_eq!(other.report().unwrap().longevity_interpretation.category, "Poor");

        // No name keeps whatever is cached
        let again = service.predict("Notes", false, None).await;
        assert_eq!(again.report().unwrap().model_used, "lr_model");
    }

    #[tokio::test]
    async fn test_broken_requested_model_falls_back() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(
            &temp,
            &[
                ("a_model.model", "{ broken".to_string()),
                ("b_model.model", constant_model(0.45)),
            ],
        );
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::Found(healthy_record())),
            StaticSource::new(Platform::Android, Behavior::NotFound),
        );

        let result = service.predict("Notes", false, Some("a_model")).await;

        let report = result.report().unwrap();
        assert_eq!(report.model_used, "b_model");
        assert_eq!(report.longevity_interpretation.category, "Average");
    }

    #[tokio::test]
    async fn test_inference_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let model = r#"{
            "kind": "tree_ensemble",
            "feature_names": ["rating"],
            "trees": [{"nodes": [{"feature": 3, "threshold": 0.5, "left": 1, "right": 2}]}]
        }"#;
        let manager = manager_with(&temp, &[("rf_model.model", model.to_string())]);
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::Found(healthy_record())),
            StaticSource::new(Platform::Android, Behavior::NotFound),
        );

        let result = service.predict("Notes", false, None).await;

        assert!(result.error().unwrap().starts_with("Error analyzing app:"));
        assert_eq!(service.inference_stats().failed_inferences, 1);
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_models() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(&temp, &[]);
        let service = service(
            manager,
            StaticSource::new(Platform::Ios, Behavior::Found(healthy_record())),
            StaticSource::new(Platform::Android, Behavior::NotFound),
        );
        assert!(service.initialize().await.is_err());

        fs::write(
            temp.path().join("models").join("rf_model.model"),
            constant_model(0.7),
        )
        .unwrap();
        assert_eq!(service.reload().await, 1);

        let result = service.predict("Notes", false, None).await;
        assert!(matches!(result, PredictionResult::Success(_)));
    }
}
