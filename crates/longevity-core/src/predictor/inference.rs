//! Model scoring
//!
//! Wraps the bundle's scoring call: converts the aligned row to numbers,
//! takes the first output as the longevity score and tracks call counts.

use super::features::AlignedFeatures;
use crate::error::PredictError;
use crate::manager::ModelBundle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Scoring slower than this is logged
const SLOW_INFERENCE_MS: u128 = 50;

/// Runs the loaded model on aligned features
#[derive(Debug, Default)]
pub struct InferenceEngine {
    inference_count: AtomicU64,
    failure_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl InferenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one row; the first model output is the longevity score
    pub fn score(
        &self,
        bundle: &ModelBundle,
        features: &AlignedFeatures,
    ) -> Result<f64, PredictError> {
        let result = self.run(bundle, features);
        if result.is_err() {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn run(&self, bundle: &ModelBundle, features: &AlignedFeatures) -> Result<f64, PredictError> {
        let model = bundle
            .model
            .as_ref()
            .ok_or(PredictError::NoModelAvailable)?;
        let inputs = features
            .row
            .to_numeric()
            .map_err(|e| PredictError::inference(e.to_string()))?;

        let start = Instant::now();
        let outputs = model
            .predict(&inputs)
            .map_err(|e| PredictError::inference(format!("{:#}", e)))?;
        let elapsed = start.elapsed();

        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > SLOW_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                kind = %model.kind(),
                "Inference exceeded {}ms",
                SLOW_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        match outputs.first() {
            Some(score) if score.is_finite() => Ok(*score),
            Some(score) => Err(PredictError::inference(format!(
                "model produced a non-finite score ({})",
                score
            ))),
            None => Err(PredictError::inference("model returned no values")),
        }
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            failed_inferences: self.failure_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

/// Inference statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub failed_inferences: u64,
    pub slow_inferences: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{LinearModel, ScoringModel};
    use crate::models::{FeatureRow, FeatureValue};
    use crate::predictor::features::TransformStage;

    struct FixedOutput(Vec<f64>);

    impl ScoringModel for FixedOutput {
        fn kind(&self) -> &str {
            "fixed"
        }

        fn input_columns(&self) -> Option<&[String]> {
            None
        }

        fn predict(&self, _inputs: &[f64]) -> anyhow::Result<Vec<f64>> {
            Ok(self.0.clone())
        }
    }

    fn bundle_with(model: Box<dyn ScoringModel>) -> ModelBundle {
        ModelBundle {
            name: Some("test_model".into()),
            model: Some(model),
            ..ModelBundle::empty()
        }
    }

    fn features(values: Vec<f64>) -> AlignedFeatures {
        let columns = (0..values.len()).map(|i| format!("f{}", i)).collect();
        AlignedFeatures {
            row: FeatureRow::from_numeric(columns, values),
            stage: TransformStage::Raw,
        }
    }

    #[test]
    fn test_linear_score() {
        let engine = InferenceEngine::new();
        let bundle = bundle_with(Box::new(LinearModel {
            feature_names: vec!["f0".into(), "f1".into()],
            coefficients: vec![0.1, 0.2],
            intercept: 0.05,
        }));

        let score = engine.score(&bundle, &features(vec![1.0, 2.0])).unwrap();

        assert!((score - 0.55).abs() < 1e-9);
        assert_eq!(engine.stats().total_inferences, 1);
    }

    #[test]
    fn test_first_output_is_score() {
        let engine = InferenceEngine::new();
        let bundle = bundle_with(Box::new(FixedOutput(vec![0.42, 0.9])));
        assert_eq!(engine.score(&bundle, &features(vec![1.0])).unwrap(), 0.42);
    }

    #[test]
    fn test_malformed_outputs() {
        let engine = InferenceEngine::new();

        let empty = bundle_with(Box::new(FixedOutput(vec![])));
        let err = engine.score(&empty, &features(vec![1.0])).err().unwrap();
        assert_eq!(err.kind(), "inference_failed");

        let nan = bundle_with(Box::new(FixedOutput(vec![f64::NAN])));
        assert!(engine.score(&nan, &features(vec![1.0])).is_err());

        assert_eq!(engine.stats().failed_inferences, 2);
    }

    #[test]
    fn test_text_reaching_model_fails() {
        let engine = InferenceEngine::new();
        let bundle = bundle_with(Box::new(FixedOutput(vec![0.5])));
        let mut row = FeatureRow::new();
        row.push("category", FeatureValue::from("Games"));

        let err = engine
            .score(
                &bundle,
                &AlignedFeatures {
                    row,
                    stage: TransformStage::Raw,
                },
            )
            .err()
            .unwrap();
        assert!(matches!(err, PredictError::InferenceFailed(_)));
    }

    #[test]
    fn test_wrong_width_fails() {
        let engine = InferenceEngine::new();
        let bundle = bundle_with(Box::new(LinearModel {
            feature_names: vec!["f0".into()],
            coefficients: vec![1.0],
            intercept: 0.0,
        }));
        let err = engine.score(&bundle, &features(vec![1.0, 2.0])).err().unwrap();
        assert!(err.to_string().contains("expecting 1 features"));
    }
}
