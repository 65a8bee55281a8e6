//! ONNX checkpoint inference using tract
//!
//! Checkpoints are parsed once at load time. The input width is only known
//! once a row arrives, so the runnable plan is built lazily and cached per
//! width.

use super::ScoringModel;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tract_onnx::prelude::*;
use tracing::debug;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Neural network checkpoint producing a single score per row
pub struct OnnxModel {
    model: InferenceModel,
    plan: RwLock<Option<(usize, Arc<TractModel>)>>,
}

impl OnnxModel {
    /// Parse an ONNX checkpoint from disk
    pub fn load(path: &Path) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .context("Failed to parse ONNX model")?;
        Ok(Self {
            model,
            plan: RwLock::new(None),
        })
    }

    fn plan_for(&self, width: usize) -> Result<Arc<TractModel>> {
        {
            let cached = self
                .plan
                .read()
                .map_err(|e| anyhow::anyhow!("Lock poisoned: {}", e))?;
            if let Some((w, plan)) = cached.as_ref() {
                if *w == width {
                    return Ok(plan.clone());
                }
            }
        }

        let plan = Arc::new(
            self.model
                .clone()
                .with_input_fact(0, f32::fact([1, width]).into())
                .context("Failed to set input shape")?
                .into_optimized()
                .context("Failed to optimize model")?
                .into_runnable()
                .context("Failed to create runnable model")?,
        );
        debug!(width, "Compiled ONNX plan");

        let mut cached = self
            .plan
            .write()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {}", e))?;
        *cached = Some((width, plan.clone()));
        Ok(plan)
    }
}

impl ScoringModel for OnnxModel {
    fn kind(&self) -> &str {
        "onnx"
    }

    fn input_columns(&self) -> Option<&[String]> {
        None
    }

    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        let plan = self.plan_for(inputs.len())?;
        let data: Vec<f32> = inputs.iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, inputs.len()), data)
            .context("Failed to shape input tensor")?
            .into();

        let result = plan.run(tvec!(input.into()))?;
        let output = result.get(0).context("No output from model")?;
        let view = output.to_array_view::<f32>()?;
        Ok(view.iter().map(|v| *v as f64).collect())
    }
}
