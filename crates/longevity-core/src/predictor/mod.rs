//! Prediction pipeline: reconciliation, scoring, formatting and the
//! orchestrating service

mod features;
mod inference;
mod output;
mod service;

#[cfg(test)]
mod tests;

pub use features::{AlignedFeatures, FeatureReconciler, SourceSelection, TransformStage};
pub use inference::{InferenceEngine, InferenceStats};
pub use output::{
    describe_feature, interpret_score, key_metrics, OutputConfig, OutputFormatter, UNKNOWN_METRIC,
};
pub use service::{PredictionConfig, PredictionService, DEFAULT_FETCH_TIMEOUT};
