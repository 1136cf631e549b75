//! Server configuration
//!
//! Everything comes from `AGRIMIND_*` environment variables with sensible
//! defaults for a local deployment. The disease input size lives here so a
//! model pair trained at a different resolution (some artifacts use 160)
//! changes exactly one value.

use advisor_lib::pipeline::DEFAULT_CONFIDENCE_FLOOR;
use advisor_lib::registry::{RegistryConfig, DEFAULT_IMAGE_INPUT_SIZE};
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Which advice strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceMode {
    /// Deterministic templates, no external calls.
    Rules,
    /// Remote text generation with the fallback chain.
    Generative,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the model artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_crop_model_file")]
    pub crop_model_file: String,

    #[serde(default = "default_crop_labels_file")]
    pub crop_labels_file: String,

    #[serde(default = "default_disease_model_file")]
    pub disease_model_file: String,

    #[serde(default = "default_disease_classes_file")]
    pub disease_classes_file: String,

    /// Square input dimension the disease artifact was trained at
    #[serde(default = "default_disease_input_size")]
    pub disease_input_size: u32,

    /// Minimum acceptable confidence for the image pipeline
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,

    #[serde(default = "default_advice_mode")]
    pub advice_mode: AdviceMode,

    /// Primary text-generation endpoint (required for generative mode)
    #[serde(default)]
    pub generation_url: Option<String>,

    /// Local fallback generation endpoint with the same signature
    #[serde(default)]
    pub generation_fallback_url: Option<String>,

    /// Bearer token for the primary generation endpoint
    #[serde(default)]
    pub generation_api_key: Option<String>,

    /// Per-attempt generation timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// History store endpoint; history is disabled when unset
    #[serde(default)]
    pub history_url: Option<String>,

    /// Client timeout for history writes in seconds
    #[serde(default = "default_history_timeout")]
    pub history_timeout_secs: u64,
}

fn default_api_port() -> u16 {
    8000
}

fn default_model_dir() -> String {
    "models".to_string()
}

fn default_crop_model_file() -> String {
    "crop_rf.onnx".to_string()
}

fn default_crop_labels_file() -> String {
    "crop_labels.json".to_string()
}

fn default_disease_model_file() -> String {
    "disease_mobilenet.onnx".to_string()
}

fn default_disease_classes_file() -> String {
    "disease_classes.json".to_string()
}

fn default_disease_input_size() -> u32 {
    DEFAULT_IMAGE_INPUT_SIZE
}

fn default_confidence_floor() -> f32 {
    DEFAULT_CONFIDENCE_FLOOR
}

fn default_advice_mode() -> AdviceMode {
    AdviceMode::Rules
}

fn default_generation_timeout() -> u64 {
    10
}

fn default_history_timeout() -> u64 {
    2
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            model_dir: default_model_dir(),
            crop_model_file: default_crop_model_file(),
            crop_labels_file: default_crop_labels_file(),
            disease_model_file: default_disease_model_file(),
            disease_classes_file: default_disease_classes_file(),
            disease_input_size: default_disease_input_size(),
            confidence_floor: default_confidence_floor(),
            advice_mode: default_advice_mode(),
            generation_url: None,
            generation_fallback_url: None,
            generation_api_key: None,
            generation_timeout_secs: default_generation_timeout(),
            history_url: None,
            history_timeout_secs: default_history_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGRIMIND"))
            .build()?;

        let config = Self::deserialize_or_default(source);
        config.validate()?;
        Ok(config)
    }

    fn deserialize_or_default(source: config::Config) -> Self {
        match source.try_deserialize() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Invalid environment configuration, falling back to defaults");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.advice_mode == AdviceMode::Generative && self.generation_url.is_none() {
            anyhow::bail!("AGRIMIND_ADVICE_MODE=generative requires AGRIMIND_GENERATION_URL");
        }
        Ok(())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            model_dir: PathBuf::from(&self.model_dir),
            crop_model_file: self.crop_model_file.clone(),
            crop_labels_file: self.crop_labels_file.clone(),
            disease_model_file: self.disease_model_file.clone(),
            disease_classes_file: self.disease_classes_file.clone(),
            disease_input_size: self.disease_input_size,
        }
    }
}
