//! Model artifacts and their loaders
//!
//! Two artifact families are supported:
//! - Serialized object documents (`.model`): JSON tagged by `kind`, holding
//!   linear models, tree ensembles, scalers and column transformers
//! - Neural checkpoints (`.onnx`): executed with tract, behind the `onnx`
//!   feature

mod document;
#[cfg(feature = "onnx")]
mod onnx;

pub use document::{
    ArtifactDocument, CategoricalColumn, ColumnTransformer, ColumnTransformerSpec, LinearModel,
    LogisticModel, MinMaxScaler, NumericColumns, RegressionTree, StandardScaler, TreeEnsemble,
    TreeNode,
};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

use crate::models::FeatureRow;
use anyhow::{Context, Result};
use std::path::Path;

/// Extension of serialized object documents
pub const DOCUMENT_EXTENSION: &str = "model";

/// Extension of neural network checkpoints
pub const ONNX_EXTENSION: &str = "onnx";

/// A loaded scoring model
pub trait ScoringModel: Send + Sync {
    /// Short name of the estimator, e.g. `linear_regression`
    fn kind(&self) -> &str;

    /// Columns the model was trained on, in input order, when known
    fn input_columns(&self) -> Option<&[String]>;

    /// Score a single row of numeric inputs
    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>>;
}

/// A fitted feature transform (scaler or column preprocessor)
pub trait FeatureTransform: Send + Sync {
    fn kind(&self) -> &str;

    /// Input columns the transform was fitted on, when known
    fn expected_columns(&self) -> Option<&[String]>;

    /// Transform a row into a numeric row
    fn transform(&self, row: &FeatureRow) -> Result<FeatureRow>;
}

/// Artifact family, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Document,
    NeuralCheckpoint,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(DOCUMENT_EXTENSION) => Some(ArtifactFormat::Document),
            Some(ONNX_EXTENSION) => Some(ArtifactFormat::NeuralCheckpoint),
            _ => None,
        }
    }
}

/// Load a scoring model from disk
pub fn load_model(path: &Path) -> Result<Box<dyn ScoringModel>> {
    match ArtifactFormat::from_path(path) {
        Some(ArtifactFormat::Document) => ArtifactDocument::read(path)?.into_model(),
        Some(ArtifactFormat::NeuralCheckpoint) => load_checkpoint(path),
        None => anyhow::bail!("Unsupported model format: {}", path.display()),
    }
}

/// Load a scaler or preprocessor from disk
pub fn load_transform(path: &Path) -> Result<Box<dyn FeatureTransform>> {
    match ArtifactFormat::from_path(path) {
        Some(ArtifactFormat::Document) => ArtifactDocument::read(path)?.into_transform(),
        _ => anyhow::bail!("Unsupported transform format: {}", path.display()),
    }
}

#[cfg(feature = "onnx")]
fn load_checkpoint(path: &Path) -> Result<Box<dyn ScoringModel>> {
    let model = OnnxModel::load(path)
        .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_checkpoint(path: &Path) -> Result<Box<dyn ScoringModel>> {
    Err(anyhow::anyhow!("neural checkpoint runtime not available"))
        .with_context(|| format!("Cannot load {} without the `onnx` feature", path.display()))
}
