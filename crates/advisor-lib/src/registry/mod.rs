//! Model registry
//!
//! Owns the two inference artifacts (tabular crop recommender, image disease
//! classifier) and the disease class table. Both loads happen once at process
//! start and are independent: a failed load leaves that slot unavailable for
//! the process lifetime without affecting the other model.

mod crop;
mod disease;

pub use crop::{CropModel, NUM_FEATURES};
pub use disease::{ClassTable, DiseaseModel};

use crate::error::{ModelKind, ServiceError};
use crate::models::InferenceResult;
use std::path::PathBuf;
use tracing::{error, info};
use tract_onnx::prelude::Tensor;

/// Default square input dimension for the disease model. Deployments whose
/// artifact was trained at a different resolution override this in config;
/// the value lives here and nowhere else.
pub const DEFAULT_IMAGE_INPUT_SIZE: u32 = 224;

/// Inference capability of the tabular crop recommender.
pub trait CropPredict: Send + Sync {
    /// Predict the recommended crop and the top-class probability.
    fn predict(&self, features: &[f32; NUM_FEATURES]) -> anyhow::Result<(String, f32)>;
}

/// Inference capability of the image disease classifier.
pub trait DiseasePredict: Send + Sync {
    /// Square input dimension the artifact was trained at.
    fn input_size(&self) -> u32;

    /// Label for a class id; `Unknown_<id>` for ids outside the table.
    fn class_label(&self, class_id: usize) -> String;

    /// Predict the top class id and its probability.
    fn predict(&self, input: Tensor) -> anyhow::Result<(usize, f32)>;
}

/// Availability of one loaded model, decided once at startup.
pub enum ModelSlot<T> {
    Loaded(T),
    Unavailable { reason: String },
}

impl<T> ModelSlot<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelSlot::Loaded(_))
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            ModelSlot::Loaded(_) => None,
            ModelSlot::Unavailable { reason } => Some(reason),
        }
    }

    fn from_load(result: anyhow::Result<T>, what: &str) -> Self {
        match result {
            Ok(model) => {
                info!(model = what, "Model loaded successfully");
                ModelSlot::Loaded(model)
            }
            Err(e) => {
                error!(model = what, error = %format!("{e:#}"), "Error loading model");
                ModelSlot::Unavailable {
                    reason: format!("{e:#}"),
                }
            }
        }
    }
}

/// File locations and model parameters for registry loading.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub model_dir: PathBuf,
    pub crop_model_file: String,
    pub crop_labels_file: String,
    pub disease_model_file: String,
    pub disease_classes_file: String,
    /// Square input dimension the disease artifact was trained at.
    pub disease_input_size: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            crop_model_file: "crop_rf.onnx".to_string(),
            crop_labels_file: "crop_labels.json".to_string(),
            disease_model_file: "disease_mobilenet.onnx".to_string(),
            disease_classes_file: "disease_classes.json".to_string(),
            disease_input_size: DEFAULT_IMAGE_INPUT_SIZE,
        }
    }
}

/// Process-wide, read-only registry of loaded models. Shared across all
/// concurrent requests behind an `Arc`; inference takes `&self`.
pub struct ModelRegistry {
    crop: ModelSlot<Box<dyn CropPredict>>,
    disease: ModelSlot<Box<dyn DiseasePredict>>,
}

impl ModelRegistry {
    /// Load both artifacts. Never fails as a whole: each slot records its
    /// own load outcome.
    pub fn load(config: &RegistryConfig) -> Self {
        let crop = ModelSlot::from_load(
            CropModel::load(
                &config.model_dir.join(&config.crop_model_file),
                &config.model_dir.join(&config.crop_labels_file),
            )
            .map(|model| Box::new(model) as Box<dyn CropPredict>),
            "crop",
        );

        let disease = ModelSlot::from_load(
            DiseaseModel::load(
                &config.model_dir.join(&config.disease_model_file),
                &config.model_dir.join(&config.disease_classes_file),
                config.disease_input_size,
            )
            .map(|model| Box::new(model) as Box<dyn DiseasePredict>),
            "disease",
        );

        Self { crop, disease }
    }

    /// Assemble a registry from pre-built slots. Used by tests and by
    /// deployments that load artifacts through other means.
    pub fn from_slots(
        crop: ModelSlot<Box<dyn CropPredict>>,
        disease: ModelSlot<Box<dyn DiseasePredict>>,
    ) -> Self {
        Self { crop, disease }
    }

    /// A registry with both slots unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            crop: ModelSlot::Unavailable {
                reason: reason.clone(),
            },
            disease: ModelSlot::Unavailable { reason },
        }
    }

    pub fn crop_available(&self) -> bool {
        self.crop.is_loaded()
    }

    pub fn disease_available(&self) -> bool {
        self.disease.is_loaded()
    }

    /// Input dimension of the loaded disease artifact.
    pub fn disease_input_size(&self) -> Result<u32, ServiceError> {
        match &self.disease {
            ModelSlot::Loaded(model) => Ok(model.input_size()),
            ModelSlot::Unavailable { .. } => {
                Err(ServiceError::ModelUnavailable(ModelKind::Disease))
            }
        }
    }

    /// Run the tabular model over a normalized feature vector.
    pub fn predict_crop(&self, features: &[f32; NUM_FEATURES]) -> Result<InferenceResult, ServiceError> {
        match &self.crop {
            ModelSlot::Loaded(model) => {
                let (label, confidence) = model.predict(features)?;
                Ok(InferenceResult { label, confidence })
            }
            ModelSlot::Unavailable { .. } => Err(ServiceError::ModelUnavailable(ModelKind::Crop)),
        }
    }

    /// Run the disease model over a normalized `(1, S, S, 3)` tensor and
    /// resolve the top class to its label.
    pub fn predict_disease(&self, input: Tensor) -> Result<InferenceResult, ServiceError> {
        match &self.disease {
            ModelSlot::Loaded(model) => {
                let (class_id, confidence) = model.predict(input)?;
                Ok(InferenceResult {
                    label: model.class_label(class_id),
                    confidence,
                })
            }
            ModelSlot::Unavailable { .. } => {
                Err(ServiceError::ModelUnavailable(ModelKind::Disease))
            }
        }
    }

    pub fn crop_slot(&self) -> &ModelSlot<Box<dyn CropPredict>> {
        &self.crop
    }

    pub fn disease_slot(&self) -> &ModelSlot<Box<dyn DiseasePredict>> {
        &self.disease
    }
}

/// Index and score of the strictly-largest probability. The first maximum
/// wins; ties cannot occur in practice since model outputs are floats from
/// a softmax.
pub(crate) fn top_class(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        match best {
            Some((_, score)) if p <= score => {}
            _ => best = Some((i, p)),
        }
    }
    best
}
