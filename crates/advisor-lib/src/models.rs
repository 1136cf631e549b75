//! Core data models for the advisory service

use serde::{Deserialize, Serialize};

/// Soil and weather measurements for one field, as submitted by the client.
///
/// Values pass through to the model unchanged; the UI may clamp ranges but
/// the service accepts any numeric value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SoilSample {
    #[serde(rename = "N")]
    pub nitrogen: f32,
    #[serde(rename = "P")]
    pub phosphorus: f32,
    #[serde(rename = "K")]
    pub potassium: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub ph: f32,
    pub rainfall: f32,
}

impl SoilSample {
    /// Feature vector in the order the crop model was trained with:
    /// [N, P, K, temperature, humidity, pH, rainfall].
    pub fn feature_vector(&self) -> [f32; 7] {
        [
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ]
    }
}

/// Request body for `/recommend_crop`
#[derive(Debug, Clone, Deserialize)]
pub struct CropRequest {
    #[serde(flatten)]
    pub soil: SoilSample,
    pub user_id: String,
    #[serde(default)]
    pub language: Language,
}

/// Request body for `/chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(default)]
    pub language: Language,
}

/// Supported response languages. Unknown codes deserialize to English
/// (pass-through, no translation).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Telugu,
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        match code {
            "hi" => Language::Hindi,
            "te" => Language::Telugu,
            _ => Language::English,
        }
    }

    /// Human-readable name, used in translation prompts.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Telugu => "Telugu",
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Ok(Language::from_code(&code))
    }
}

/// Raw output of one inference call; never mutated after creation.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub label: String,
    pub confidence: f32,
}

/// Structured interpretation of a disease class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    pub crop: String,
    pub condition: String,
    pub is_healthy: bool,
}

/// Response body for `/recommend_crop`
#[derive(Debug, Clone, Serialize)]
pub struct CropResponse {
    pub success: bool,
    pub recommended_crop: String,
    pub confidence: f32,
    pub advice: String,
}

/// Response body for `/detect_disease`
#[derive(Debug, Clone, Serialize)]
pub struct DiseaseResponse {
    pub success: bool,
    pub crop: String,
    pub disease: String,
    pub is_healthy: bool,
    pub confidence: f32,
    pub advice: String,
}

/// Response body for `/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
}

/// An uploaded image as received from the multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}
