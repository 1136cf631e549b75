//! Image disease classification model
//!
//! Wraps the ONNX export of the leaf classifier. Input is a `(1, S, S, 3)`
//! float tensor in `[0, 1]` (NHWC); output is a `(1, M)` probability
//! distribution over disease classes. The square dimension `S` belongs to
//! the artifact and is fixed at load time.

use super::{top_class, DiseasePredict};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tract_onnx::prelude::*;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Class-id to class-name mapping for the disease model.
///
/// The artifact ships the table as class name -> integer id (the training
/// generator's layout); it is inverted on load.
pub struct ClassTable {
    names: HashMap<usize, String>,
}

impl ClassTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open disease classes at {path:?}"))?;
        let index: HashMap<String, usize> = serde_json::from_reader(BufReader::new(file))
            .context("Failed to parse disease classes")?;
        anyhow::ensure!(!index.is_empty(), "Disease class table is empty");
        Ok(Self::from_index(index))
    }

    /// Invert a name -> id table into id -> name.
    pub fn from_index(index: HashMap<String, usize>) -> Self {
        let names = index.into_iter().map(|(name, id)| (id, name)).collect();
        Self { names }
    }

    /// Label for a class id. Never fails: an id absent from the table maps
    /// to `Unknown_<id>`.
    pub fn label(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown_{class_id}"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct DiseaseModel {
    plan: TractModel,
    classes: ClassTable,
    input_size: u32,
}

impl DiseaseModel {
    /// Load and optimize the ONNX artifact plus its class table. The model
    /// and table load together: a classifier without labels is useless.
    pub fn load(model_path: &Path, classes_path: &Path, input_size: u32) -> Result<Self> {
        let side = input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("Failed to parse disease model at {model_path:?}"))?
            .with_input_fact(0, f32::fact([1, side, side, 3]).into())
            .context("Failed to set disease model input shape")?
            .into_optimized()
            .context("Failed to optimize disease model")?
            .into_runnable()
            .context("Failed to create runnable disease model")?;

        let classes = ClassTable::from_path(classes_path)?;

        Ok(Self {
            plan,
            classes,
            input_size,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }
}

impl DiseasePredict for DiseaseModel {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn class_label(&self, class_id: usize) -> String {
        self.classes.label(class_id)
    }

    fn predict(&self, input: Tensor) -> Result<(usize, f32)> {
        let result = self.plan.run(tvec!(input.into()))?;
        let output = result.first().context("No output from disease model")?;
        let view = output.to_array_view::<f32>()?;
        let probabilities: Vec<f32> = view.iter().copied().collect();

        top_class(&probabilities).context("Disease model produced empty output")
    }
}
