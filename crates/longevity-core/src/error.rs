//! Error types for the prediction pipeline

use thiserror::Error;

/// Everything that can stop a prediction from producing a score.
///
/// All kinds end up in the single `error` string of a
/// [`PredictionResult`](crate::models::PredictionResult).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictError {
    /// Registry is empty or no entry could be loaded
    #[error("No prediction model available")]
    NoModelAvailable,

    /// Bad artifact format or missing optional runtime
    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    /// Neither store returned a usable record
    #[error("Could not find sufficient data for this app on either platform")]
    NoSourceData,

    /// Transforms and the raw fallback all failed to produce a numeric row
    #[error("feature alignment failed: {0}")]
    FeatureAlignmentFailed(String),

    /// The model's predict call failed or returned malformed output
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

impl PredictError {
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoadFailed(msg.into())
    }

    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::FeatureAlignmentFailed(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::InferenceFailed(msg.into())
    }

    /// Message placed in the result's `error` field
    pub fn result_message(&self) -> String {
        match self {
            PredictError::NoModelAvailable | PredictError::NoSourceData => self.to_string(),
            other => format!("Error analyzing app: {}", other),
        }
    }

    /// Short label for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::NoModelAvailable => "no_model_available",
            PredictError::ModelLoadFailed(_) => "model_load_failed",
            PredictError::NoSourceData => "no_source_data",
            PredictError::FeatureAlignmentFailed(_) => "feature_alignment_failed",
            PredictError::InferenceFailed(_) => "inference_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_messages() {
        assert!(PredictError::NoModelAvailable
            .result_message()
            .contains("model available"));
        assert!(PredictError::NoSourceData
            .result_message()
            .contains("sufficient data"));

        let msg = PredictError::inference("model returned no values").result_message();
        assert!(msg.starts_with("Error analyzing app:"));
        assert!(msg.contains("model returned no values"));
    }

    #[test]
    fn test_kinds_are_distinct() {
        let kinds = [
            PredictError::NoModelAvailable.kind(),
            PredictError::model_load("x").kind(),
            PredictError::NoSourceData.kind(),
            PredictError::alignment("x").kind(),
            PredictError::inference("x").kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
