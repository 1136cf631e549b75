//! Request pipeline: inference invocation and response assembly
//!
//! One entry point per endpoint. Each request flows normalize -> infer ->
//! interpret -> compose advice -> translate -> history, with model
//! availability and input validation as the only failure paths that reach
//! the client. Inference runs on a blocking worker so the event loop stays
//! free; history writes are spawned and never awaited.

use crate::advice::{AdviceComposer, AdviceContext, GenerationClient};
use crate::diagnosis::parse_class_label;
use crate::error::{Result, ServiceError};
use crate::history::{
    ChatRecord, DetectionRecord, HistoryStore, HistoryWrite, RecommendationRecord,
};
use crate::models::{
    ChatRequest, ChatResponse, CropRequest, CropResponse, DiseaseResponse, ImageUpload, Language,
};
use crate::normalize;
use crate::observability::ServiceMetrics;
use crate::registry::ModelRegistry;
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Minimum acceptable top-class probability for the image pipeline. The
/// tabular pipeline has no floor: the recommender always returns a class.
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.30;

const LOW_CONFIDENCE_DETAIL: &str =
    "The uploaded image does not appear to be a valid plant leaf image. \
     Please upload a clear image of a plant leaf.";

/// Confidence at the floor is accepted; only strictly-below is rejected.
fn meets_floor(confidence: f32, floor: f32) -> bool {
    confidence >= floor
}

/// The request-handling and model-inference orchestration layer. Shared
/// read-only across all concurrent requests.
pub struct AdvisoryService {
    registry: Arc<ModelRegistry>,
    composer: Arc<dyn AdviceComposer>,
    generation: Option<Arc<GenerationClient>>,
    history: Arc<HistoryStore>,
    metrics: ServiceMetrics,
    confidence_floor: f32,
}

impl AdvisoryService {
    pub fn new(
        registry: Arc<ModelRegistry>,
        composer: Arc<dyn AdviceComposer>,
        generation: Option<Arc<GenerationClient>>,
        history: Arc<HistoryStore>,
        confidence_floor: f32,
    ) -> Self {
        Self {
            registry,
            composer,
            generation,
            history,
            metrics: ServiceMetrics::new(),
            confidence_floor,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Tabular pipeline: features -> crop -> advice.
    pub async fn recommend_crop(&self, request: CropRequest) -> Result<CropResponse> {
        let features = request.soil.feature_vector();

        let registry = self.registry.clone();
        let start = Instant::now();
        let inference = tokio::task::spawn_blocking(move || registry.predict_crop(&features))
            .await
            .context("Crop inference task panicked")??;
        self.metrics
            .observe_inference_latency("crop", start.elapsed().as_secs_f64());

        info!(
            crop = %inference.label,
            confidence = inference.confidence,
            "Crop recommendation generated"
        );

        let advice = self
            .composer
            .compose(&AdviceContext::CropRecommendation {
                crop: &inference.label,
                soil: &request.soil,
            })
            .await;

        let advice = self.translate(&advice, request.language).await;
        let crop = self.translate(&inference.label, request.language).await;

        self.history.spawn_write(
            request.user_id,
            HistoryWrite::Recommendation(RecommendationRecord {
                crop: crop.clone(),
                advice: advice.clone(),
                soil: request.soil,
            }),
        );

        Ok(CropResponse {
            success: true,
            recommended_crop: crop,
            confidence: inference.confidence,
            advice,
        })
    }

    /// Image pipeline: upload -> tensor -> class -> diagnosis -> advice.
    pub async fn detect_disease(
        &self,
        upload: ImageUpload,
        user_id: Option<String>,
        language: Language,
    ) -> Result<DiseaseResponse> {
        // Content-type gate runs before anything touches the model
        normalize::validate_image_content_type(&upload)?;

        let input_size = self.registry.disease_input_size()?;
        let tensor = normalize::image_tensor(&upload, input_size)?;

        let registry = self.registry.clone();
        let start = Instant::now();
        let inference = tokio::task::spawn_blocking(move || registry.predict_disease(tensor))
            .await
            .context("Disease inference task panicked")??;
        self.metrics
            .observe_inference_latency("disease", start.elapsed().as_secs_f64());

        if !meets_floor(inference.confidence, self.confidence_floor) {
            info!(
                label = %inference.label,
                confidence = inference.confidence,
                floor = self.confidence_floor,
                "Image rejected below confidence floor"
            );
            return Err(ServiceError::LowConfidence(LOW_CONFIDENCE_DETAIL.to_string()));
        }

        let diagnosis = parse_class_label(&inference.label);
        info!(
            label = %inference.label,
            crop = %diagnosis.crop,
            condition = %diagnosis.condition,
            confidence = inference.confidence,
            "Disease diagnosis generated"
        );

        let advice = self
            .composer
            .compose(&AdviceContext::Diagnosis(&diagnosis))
            .await;

        let advice = self.translate(&advice, language).await;
        let crop = self.translate(&diagnosis.crop, language).await;
        let disease = self.translate(&diagnosis.condition, language).await;

        if let Some(user_id) = user_id {
            self.history.spawn_write(
                user_id,
                HistoryWrite::Detection(DetectionRecord {
                    crop: crop.clone(),
                    disease: disease.clone(),
                    is_healthy: diagnosis.is_healthy,
                    confidence: inference.confidence,
                    advice: advice.clone(),
                }),
            );
        }

        Ok(DiseaseResponse {
            success: true,
            crop,
            disease,
            is_healthy: diagnosis.is_healthy,
            confidence: inference.confidence,
            advice,
        })
    }

    /// Free-form question answered through the advice composer.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let response = self
            .composer
            .compose(&AdviceContext::Chat {
                message: &request.message,
            })
            .await;
        let response = self.translate(&response, request.language).await;

        self.history.spawn_write(
            request.user_id,
            HistoryWrite::Chat(ChatRecord {
                question: request.message,
                response: response.clone(),
            }),
        );

        Ok(ChatResponse {
            success: true,
            response,
        })
    }

    /// Route text through the generation capability for non-English
    /// requests; pass-through when no generation client is configured or
    /// translation fails.
    async fn translate(&self, text: &str, language: Language) -> String {
        match (&self.generation, language) {
            (_, Language::English) => text.to_string(),
            (Some(client), _) => client.translate(text, language).await,
            (None, _) => text.to_string(),
        }
    }
}
