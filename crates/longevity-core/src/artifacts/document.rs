//! Serialized object documents
//!
//! Each `.model` file is a JSON document tagged by `kind`. Scoring kinds
//! become [`ScoringModel`]s, transform kinds become [`FeatureTransform`]s.

use super::{FeatureTransform, ScoringModel};
use crate::models::{FeatureRow, FeatureValue};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level artifact document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactDocument {
    LinearRegression(LinearModel),
    LogisticRegression(LinearModel),
    TreeEnsemble(TreeEnsemble),
    StandardScaler(StandardScaler),
    MinMaxScaler(MinMaxScaler),
    ColumnTransformer(ColumnTransformerSpec),
}

impl ArtifactDocument {
    /// Read and parse a document from disk
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactDocument::LinearRegression(_) => "linear_regression",
            ArtifactDocument::LogisticRegression(_) => "logistic_regression",
            ArtifactDocument::TreeEnsemble(_) => "tree_ensemble",
            ArtifactDocument::StandardScaler(_) => "standard_scaler",
            ArtifactDocument::MinMaxScaler(_) => "min_max_scaler",
            ArtifactDocument::ColumnTransformer(_) => "column_transformer",
        }
    }

    pub fn into_model(self) -> Result<Box<dyn ScoringModel>> {
        let kind = self.kind();
        match self {
            ArtifactDocument::LinearRegression(m) => {
                m.validate()?;
                Ok(Box::new(m))
            }
            ArtifactDocument::LogisticRegression(m) => {
                m.validate()?;
                Ok(Box::new(LogisticModel(m)))
            }
            ArtifactDocument::TreeEnsemble(m) => {
                m.validate()?;
                Ok(Box::new(m))
            }
            _ => anyhow::bail!(
                "artifact of kind `{}` is a feature transform, not a scoring model",
                kind
            ),
        }
    }

    pub fn into_transform(self) -> Result<Box<dyn FeatureTransform>> {
        let kind = self.kind();
        match self {
            ArtifactDocument::StandardScaler(s) => {
                s.validate()?;
                Ok(Box::new(s))
            }
            ArtifactDocument::MinMaxScaler(s) => {
                s.validate()?;
                Ok(Box::new(s))
            }
            ArtifactDocument::ColumnTransformer(spec) => {
                Ok(Box::new(ColumnTransformer::new(spec)?))
            }
            _ => anyhow::bail!(
                "artifact of kind `{}` is a scoring model, not a feature transform",
                kind
            ),
        }
    }
}

fn check_width(inputs: &[f64], expected: usize) -> Result<()> {
    if inputs.len() != expected {
        anyhow::bail!(
            "X has {} features, but the model is expecting {} features as input",
            inputs.len(),
            expected
        );
    }
    Ok(())
}

/// Ordinary least squares model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearModel {
    fn validate(&self) -> Result<()> {
        if self.coefficients.len() != self.feature_names.len() {
            anyhow::bail!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            );
        }
        Ok(())
    }

    fn decision(&self, inputs: &[f64]) -> Result<f64> {
        check_width(inputs, self.coefficients.len())?;
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(inputs)
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }
}

impl ScoringModel for LinearModel {
    fn kind(&self) -> &str {
        "linear_regression"
    }

    fn input_columns(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![self.decision(inputs)?])
    }
}

/// Logistic regression; scores are the positive-class probability
#[derive(Debug, Clone)]
pub struct LogisticModel(pub LinearModel);

impl ScoringModel for LogisticModel {
    fn kind(&self) -> &str {
        "logistic_regression"
    }

    fn input_columns(&self) -> Option<&[String]> {
        Some(&self.0.feature_names)
    }

    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        let z = self.0.decision(inputs)?;
        Ok(vec![1.0 / (1.0 + (-z).exp())])
    }
}

/// Node of a regression tree. Leaves have no `feature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub right: usize,
    #[serde(default)]
    pub value: f64,
}

/// Flattened regression tree, root at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, inputs: &[f64]) -> Result<f64> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            let node = self
                .nodes
                .get(idx)
                .with_context(|| format!("tree node {} out of range", idx))?;
            let feature = match node.feature {
                None => return Ok(node.value),
                Some(f) => f,
            };
            let x = inputs
                .get(feature)
                .with_context(|| format!("tree splits on missing feature {}", feature))?;
            idx = if *x <= node.threshold { node.left } else { node.right };
        }
        anyhow::bail!("tree does not terminate")
    }
}

/// Averaging ensemble of regression trees (random forest style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    pub trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            anyhow::bail!("tree ensemble has no trees");
        }
        if self.trees.iter().any(|t| t.nodes.is_empty()) {
            anyhow::bail!("tree ensemble contains an empty tree");
        }
        Ok(())
    }
}

impl ScoringModel for TreeEnsemble {
    fn kind(&self) -> &str {
        "tree_ensemble"
    }

    fn input_columns(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        check_width(inputs, self.feature_names.len())?;
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(inputs)?;
        }
        Ok(vec![total / self.trees.len() as f64])
    }
}

/// Zero scale means a constant feature; it is left unscaled
fn safe_scale(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

/// Standardizes features: `(x - mean) / scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    #[serde(default)]
    pub feature_names_in: Option<Vec<String>>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            anyhow::bail!("scaler has {} means but {} scales", self.mean.len(), self.scale.len());
        }
        if let Some(names) = &self.feature_names_in {
            if names.len() != self.mean.len() {
                anyhow::bail!(
                    "scaler names {} features but was fitted on {}",
                    names.len(),
                    self.mean.len()
                );
            }
        }
        Ok(())
    }
}

impl FeatureTransform for StandardScaler {
    fn kind(&self) -> &str {
        "standard_scaler"
    }

    fn expected_columns(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    fn transform(&self, row: &FeatureRow) -> Result<FeatureRow> {
        let values = row.to_numeric()?;
        check_width(&values, self.mean.len())?;
        let scaled = values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / safe_scale(*s))
            .collect();
        Ok(FeatureRow::from_numeric(row.columns().to_vec(), scaled))
    }
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

/// Rescales features into `feature_range`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    #[serde(default)]
    pub feature_names_in: Option<Vec<String>>,
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
    #[serde(default = "default_feature_range")]
    pub feature_range: (f64, f64),
}

impl MinMaxScaler {
    fn validate(&self) -> Result<()> {
        if self.data_min.len() != self.data_max.len() {
            anyhow::bail!(
                "scaler has {} minimums but {} maximums",
                self.data_min.len(),
                self.data_max.len()
            );
        }
        if let Some(names) = &self.feature_names_in {
            if names.len() != self.data_min.len() {
                anyhow::bail!(
                    "scaler names {} features but was fitted on {}",
                    names.len(),
                    self.data_min.len()
                );
            }
        }
        Ok(())
    }
}

impl FeatureTransform for MinMaxScaler {
    fn kind(&self) -> &str {
        "min_max_scaler"
    }

    fn expected_columns(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    fn transform(&self, row: &FeatureRow) -> Result<FeatureRow> {
        let values = row.to_numeric()?;
        check_width(&values, self.data_min.len())?;
        let (lo, hi) = self.feature_range;
        let scaled = values
            .iter()
            .zip(self.data_min.iter().zip(&self.data_max))
            .map(|(x, (min, max))| (x - min) / safe_scale(max - min) * (hi - lo) + lo)
            .collect();
        Ok(FeatureRow::from_numeric(row.columns().to_vec(), scaled))
    }
}

/// Standardized numeric block of a column transformer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericColumns {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// One-hot encoded categorical column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub column: String,
    pub categories: Vec<String>,
}

/// Serialized form of a column transformer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformerSpec {
    #[serde(default)]
    pub numeric: Option<NumericColumns>,
    #[serde(default)]
    pub categorical: Vec<CategoricalColumn>,
}

/// Fitted column transformer: scales numeric columns, one-hot encodes
/// categorical ones (unknown categories encode as all zeros) and drops
/// everything else.
#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    spec: ColumnTransformerSpec,
    expected: Vec<String>,
}

impl ColumnTransformer {
    pub fn new(spec: ColumnTransformerSpec) -> Result<Self> {
        let mut expected = Vec::new();
        if let Some(numeric) = &spec.numeric {
            if numeric.columns.len() != numeric.mean.len()
                || numeric.columns.len() != numeric.scale.len()
            {
                anyhow::bail!("numeric block has mismatched column, mean and scale lengths");
            }
            expected.extend(numeric.columns.iter().cloned());
        }
        expected.extend(spec.categorical.iter().map(|c| c.column.clone()));
        if expected.is_empty() {
            anyhow::bail!("column transformer has no columns");
        }
        Ok(Self { spec, expected })
    }

    /// Output column names, `num__<col>` and `cat__<col>_<category>`
    pub fn output_columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(numeric) = &self.spec.numeric {
            out.extend(numeric.columns.iter().map(|c| format!("num__{}", c)));
        }
        for cat in &self.spec.categorical {
            out.extend(
                cat.categories
                    .iter()
                    .map(|v| format!("cat__{}_{}", cat.column, v)),
            );
        }
        out
    }
}

impl FeatureTransform for ColumnTransformer {
    fn kind(&self) -> &str {
        "column_transformer"
    }

    fn expected_columns(&self) -> Option<&[String]> {
        Some(&self.expected)
    }

    fn transform(&self, row: &FeatureRow) -> Result<FeatureRow> {
        let mut values = Vec::new();

        if let Some(numeric) = &self.spec.numeric {
            for (i, column) in numeric.columns.iter().enumerate() {
                let x = row
                    .get(column)
                    .and_then(FeatureValue::as_f64)
                    .with_context(|| format!("could not convert column `{}` to float", column))?;
                values.push((x - numeric.mean[i]) / safe_scale(numeric.scale[i]));
            }
        }

        for cat in &self.spec.categorical {
            let observed = row.get(&cat.column).and_then(FeatureValue::as_text);
            values.extend(cat.categories.iter().map(|category| {
                if observed == Some(category.as_str()) {
                    1.0
                } else {
                    0.0
                }
            }));
        }

        Ok(FeatureRow::from_numeric(self.output_columns(), values))
    }
}
