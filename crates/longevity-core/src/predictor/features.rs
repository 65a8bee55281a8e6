//! Feature reconciliation
//!
//! Picks one catalog record, turns it into a feature row and adjusts that
//! row to whatever the loaded bundle was trained on: preprocessor first,
//! then scaler, then the raw row, finally aligned to the model's own input
//! columns when it declares them.

use crate::artifacts::FeatureTransform;
use crate::error::PredictError;
use crate::manager::ModelBundle;
use crate::models::{AppRecord, FeatureRow, FeatureValue, Platform};
use tracing::{debug, warn};

/// Record chosen for a prediction and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSelection {
    pub platform: Platform,
    pub record: AppRecord,
}

/// Which path produced the final row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStage {
    Preprocessor,
    Scaler,
    Raw,
}

/// Row ready for the model
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFeatures {
    pub row: FeatureRow,
    pub stage: TransformStage,
}

/// Turns catalog records into model inputs
#[derive(Debug, Clone, Default)]
pub struct FeatureReconciler;

impl FeatureReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Pick the record with fewer missing fields; ties go to `primary`
    pub fn select_record(
        &self,
        primary: (Platform, Option<AppRecord>),
        secondary: (Platform, Option<AppRecord>),
    ) -> Option<SourceSelection> {
        let selection = match (primary, secondary) {
            ((p, Some(a)), (s, Some(b))) => {
                if b.missing_count() < a.missing_count() {
                    (s, b)
                } else {
                    (p, a)
                }
            }
            ((p, Some(a)), (_, None)) => (p, a),
            ((_, None), (s, Some(b))) => (s, b),
            ((_, None), (_, None)) => return None,
        };
        debug!(platform = %selection.0, fields = selection.1.len(), "Selected source record");
        Some(SourceSelection {
            platform: selection.0,
            record: selection.1,
        })
    }

    /// Drop identity fields and fill gaps with zero
    pub fn prepare(&self, record: &AppRecord) -> FeatureRow {
        let mut row = FeatureRow::new();
        for (name, value) in record.without_identity().iter() {
            let value = match value {
                FeatureValue::Missing => FeatureValue::Number(0.0),
                other => other.clone(),
            };
            row.push(name.clone(), value);
        }
        row
    }

    /// Run the bundle's transform chain and align to the model's inputs
    pub fn align(
        &self,
        bundle: &ModelBundle,
        row: &FeatureRow,
    ) -> Result<AlignedFeatures, PredictError> {
        let (staged, stage) = self.transform(bundle, row);

        let row = match bundle.model.as_ref().and_then(|m| m.input_columns()) {
            Some(columns) => staged.align(columns),
            None => staged,
        };

        if row.is_empty() {
            return Err(PredictError::alignment(
                "no feature columns left after alignment",
            ));
        }
        Ok(AlignedFeatures { row, stage })
    }

    fn transform(&self, bundle: &ModelBundle, row: &FeatureRow) -> (FeatureRow, TransformStage) {
        let chain = [
            (bundle.preprocessor.as_deref(), TransformStage::Preprocessor),
            (bundle.scaler.as_deref(), TransformStage::Scaler),
        ];
        for (transform, stage) in chain {
            let Some(transform) = transform else { continue };
            match apply(transform, row) {
                Ok(out) => return (out, stage),
                Err(e) => warn!(
                    stage = ?stage,
                    kind = %transform.kind(),
                    error = %format!("{:#}", e),
                    "Feature transform failed, trying next"
                ),
            }
        }
        (row.clone(), TransformStage::Raw)
    }
}

fn apply(transform: &dyn FeatureTransform, row: &FeatureRow) -> anyhow::Result<FeatureRow> {
    match transform.expected_columns() {
        Some(columns) => transform.transform(&row.align(columns)),
        None => transform.transform(row),
    }
}
