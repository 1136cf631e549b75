//! Tabular crop recommendation model
//!
//! Wraps the ONNX export of the crop classifier. Input is a `(1, 7)` float
//! vector of soil and weather features; output is a `(1, N)` probability
//! distribution over crops, mapped to names through an index-aligned label
//! list shipped next to the artifact.

use super::{top_class, CropPredict};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tract_onnx::prelude::*;

/// Number of input features expected by the model:
/// N, P, K, temperature, humidity, pH, rainfall.
pub const NUM_FEATURES: usize = 7;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct CropModel {
    plan: TractModel,
    labels: Vec<String>,
}

impl CropModel {
    /// Load and optimize the ONNX artifact plus its crop label list.
    pub fn load(model_path: &Path, labels_path: &Path) -> Result<Self> {
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("Failed to parse crop model at {model_path:?}"))?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set crop model input shape")?
            .into_optimized()
            .context("Failed to optimize crop model")?
            .into_runnable()
            .context("Failed to create runnable crop model")?;

        let file = File::open(labels_path)
            .with_context(|| format!("Failed to open crop labels at {labels_path:?}"))?;
        let labels: Vec<String> = serde_json::from_reader(BufReader::new(file))
            .context("Failed to parse crop labels")?;
        anyhow::ensure!(!labels.is_empty(), "Crop label list is empty");

        Ok(Self { plan, labels })
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }
}

impl CropPredict for CropModel {
    fn predict(&self, features: &[f32; NUM_FEATURES]) -> Result<(String, f32)> {
        let input: Tensor =
            tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), features.to_vec())
                .context("Failed to shape crop features")?
                .into();

        let result = self.plan.run(tvec!(input.into()))?;
        let output = result.first().context("No output from crop model")?;
        let view = output.to_array_view::<f32>()?;
        let probabilities: Vec<f32> = view.iter().copied().collect();

        let (index, confidence) =
            top_class(&probabilities).context("Crop model produced empty output")?;
        let label = self
            .labels
            .get(index)
            .with_context(|| format!("Crop class {index} missing from label list"))?
            .clone();

        Ok((label, confidence))
    }
}
