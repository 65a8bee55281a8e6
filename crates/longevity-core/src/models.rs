//! Core data models for the longevity predictor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fields that identify an app rather than describe it. Adapters emit them,
/// but they never reach a model.
pub const IDENTITY_FIELDS: &[&str] = &["app_name", "app_id", "keywords", "reviews"];

/// Store platform a record was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "Android")]
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Android => "Android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single scalar feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Missing,
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    /// Numeric view of the value. Flags count as 1/0, text and missing have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Text(_) | FeatureValue::Missing => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by the human-readable descriptions
    pub fn is_truthy(&self) -> bool {
        match self {
            FeatureValue::Missing => false,
            FeatureValue::Flag(b) => *b,
            FeatureValue::Number(v) => *v != 0.0,
            FeatureValue::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Missing => f.write_str("unknown"),
            FeatureValue::Flag(b) => write!(f, "{}", b),
            FeatureValue::Number(v) => write!(f, "{}", v),
            FeatureValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<u64> for FeatureValue {
    fn from(v: u64) -> Self {
        FeatureValue::Number(v as f64)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Number(v as f64)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Flag(v)
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl<T: Into<FeatureValue>> From<Option<T>> for FeatureValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FeatureValue::Missing)
    }
}

/// Flat record describing one app as reported by a store catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppRecord(BTreeMap<String, FeatureValue>);

impl AppRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert, handy for literals
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.0.get(name)
    }

    /// Numeric value of a field, `None` when absent, missing or textual
    pub fn number(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(FeatureValue::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(FeatureValue::as_text)
    }

    /// Number of fields explicitly present but without a value
    pub fn missing_count(&self) -> usize {
        self.0.values().filter(|v| v.is_missing()).count()
    }

    /// Copy of the record with identity fields removed
    pub fn without_identity(&self) -> AppRecord {
        AppRecord(
            self.0
                .iter()
                .filter(|(k, _)| !IDENTITY_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FeatureValue)> for AppRecord {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        AppRecord(iter.into_iter().collect())
    }
}

/// Ordered feature row handed to transforms and models
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    columns: Vec<String>,
    values: Vec<FeatureValue>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row in the record's (sorted) column order
    pub fn from_record(record: &AppRecord) -> Self {
        let mut row = Self::new();
        for (name, value) in record.iter() {
            row.push(name.clone(), value.clone());
        }
        row
    }

    pub fn from_numeric(columns: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            columns,
            values: values.into_iter().map(FeatureValue::Number).collect(),
        }
    }

    /// Append a column, replacing the value if the column already exists
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter().position(|c| *c == name) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.columns.push(name);
                self.values.push(value);
            }
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| &self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Select and reorder columns to `expected`, synthesizing absent ones as zero
    pub fn align(&self, expected: &[String]) -> FeatureRow {
        let mut aligned = FeatureRow::new();
        for name in expected {
            let value = self
                .get(name)
                .cloned()
                .unwrap_or(FeatureValue::Number(0.0));
            aligned.columns.push(name.clone());
            aligned.values.push(value);
        }
        aligned
    }

    /// Numeric values in column order; fails on the first non-numeric column
    pub fn to_numeric(&self) -> anyhow::Result<Vec<f64>> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(name, value)| {
                value.as_f64().ok_or_else(|| {
                    anyhow::anyhow!("column `{}` has non-numeric value `{}`", name, value)
                })
            })
            .collect()
    }
}

/// Human-readable reading of a longevity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub category: String,
    pub description: String,
    pub expected_lifespan: String,
    pub success_probability: String,
}

/// Direction in which a feature pushes the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
}

/// A feature that contributed to the prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub feature: String,
    pub value: FeatureValue,
    pub importance: f64,
    pub impact: Impact,
    pub description: String,
}

/// Actionable advice derived from the app's metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub area: String,
    pub issue: String,
    pub recommendation: String,
}

/// Headline metrics echoed back with a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub rating: FeatureValue,
    pub downloads: FeatureValue,
    pub price: FeatureValue,
    pub size_mb: FeatureValue,
    pub days_since_last_update: FeatureValue,
    pub days_since_release: FeatureValue,
    pub positive_sentiment_ratio: FeatureValue,
    pub in_app_purchases: FeatureValue,
    pub total_ratings: FeatureValue,
}

/// Successful prediction output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub app_name: String,
    pub platform: Platform,
    pub store_id: Option<String>,
    pub predicted_longevity: f64,
    pub longevity_interpretation: Interpretation,
    pub key_metrics: KeyMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributing_factors: Option<Vec<ContributingFactor>>,
    pub recommendations: Vec<Recommendation>,
    pub date_analyzed: String,
    pub model_used: String,
}

/// Outcome of one prediction request.
///
/// Serializes either as the full report or as exactly `{app_name, error}`,
/// so callers only ever branch on the presence of `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResult {
    Failure { app_name: String, error: String },
    Success(Box<PredictionReport>),
}

impl PredictionResult {
    pub fn failure(app_name: impl Into<String>, error: impl Into<String>) -> Self {
        PredictionResult::Failure {
            app_name: app_name.into(),
            error: error.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        match self {
            PredictionResult::Failure { app_name, .. } => app_name,
            PredictionResult::Success(report) => &report.app_name,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PredictionResult::Failure { error, .. } => Some(error),
            PredictionResult::Success(_) => None,
        }
    }

    pub fn report(&self) -> Option<&PredictionReport> {
        match self {
            PredictionResult::Success(report) => Some(report),
            PredictionResult::Failure { .. } => None,
        }
    }

    /// Flat record for the prediction history store; `None` for failures
    pub fn persistence_record(&self) -> Option<PersistenceRecord> {
        let report = self.report()?;
        let prediction_data = serde_json::to_string(report).ok()?;
        Some(PersistenceRecord {
            app_name: report.app_name.clone(),
            platform: report.platform,
            store_id: report.store_id.clone(),
            predicted_longevity: report.predicted_longevity,
            prediction_data,
        })
    }
}

/// What the history store receives for a successful prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceRecord {
    pub app_name: String,
    pub platform: Platform,
    pub store_id: Option<String>,
    pub predicted_longevity: f64,
    /// The full report as a JSON document
    pub prediction_data: String,
}
