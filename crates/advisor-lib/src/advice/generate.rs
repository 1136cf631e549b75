//! Generative advice strategy
//!
//! Builds a natural-language prompt for the structured result and queries a
//! remote text-generation endpoint. The fallback chain is explicit:
//! up to three attempts against the primary endpoint (retrying only on
//! timeout or HTTP 429, with the backoff delay doubling per attempt), then a
//! single attempt against a local fallback endpoint with the same wire
//! signature, then the fixed apology string.

use super::{AdviceComposer, AdviceContext, APOLOGY};
use crate::models::{Diagnosis, Language, SoilSample};
use crate::observability::ServiceMetrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Generation endpoint settings.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Primary remote endpoint.
    pub primary_url: String,
    /// Optional local fallback endpoint with the same request signature.
    pub fallback_url: Option<String>,
    /// Bearer token for the primary endpoint.
    pub api_key: Option<String>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Attempt cap for the primary endpoint.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt.
    pub backoff_base: Duration,
}

impl GenerationConfig {
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            primary_url: primary_url.into(),
            fallback_url: None,
            api_key: None,
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Why a generation call produced no text. Callers degrade on any variant;
/// this never propagates as a request failure.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation endpoint returned status {0}")]
    Status(u16),
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation response was not in the expected format: {0}")]
    Malformed(String),
    #[error("generation produced empty text")]
    Empty,
    #[error("all generation attempts exhausted")]
    Exhausted,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Serialize)]
struct GenerationParameters {
    max_length: u32,
    temperature: f32,
    top_p: f32,
    do_sample: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_length: 150,
            temperature: 0.7,
            top_p: 0.95,
            do_sample: true,
        }
    }
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// Client for the text-generation collaborator. Shared by advice
/// composition, translation, and chat.
pub struct GenerationClient {
    http: reqwest::Client,
    config: GenerationConfig,
    metrics: ServiceMetrics,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            metrics: ServiceMetrics::new(),
        }
    }

    /// Run the full fallback chain for one prompt. `Err` here means every
    /// endpoint failed; the caller decides what text to degrade to.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        match self
            .try_endpoint(&self.config.primary_url, prompt, self.config.max_attempts, true)
            .await
        {
            Ok(text) => return Ok(text),
            Err(e) => warn!(error = %e, "Primary generation endpoint failed"),
        }

        if let Some(fallback_url) = &self.config.fallback_url {
            self.metrics.inc_generation_fallbacks();
            match self.try_endpoint(fallback_url, prompt, 1, false).await {
                Ok(text) => return Ok(text),
                Err(e) => warn!(error = %e, "Fallback generation endpoint failed"),
            }
        }

        Err(GenerationError::Exhausted)
    }

    /// Attempt one endpoint up to `attempts` times. Retries only on timeout
    /// or HTTP 429; any other non-200 aborts immediately.
    async fn try_endpoint(
        &self,
        url: &str,
        prompt: &str,
        attempts: u32,
        authenticated: bool,
    ) -> Result<String, GenerationError> {
        let payload = GenerateRequest {
            inputs: prompt,
            parameters: GenerationParameters::default(),
        };

        let mut last_error = GenerationError::Exhausted;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            self.metrics.inc_generation_attempts();
            let mut request = self
                .http
                .post(url)
                .json(&payload)
                .timeout(self.config.timeout);
            if authenticated {
                if let Some(key) = &self.config.api_key {
                    request = request.bearer_auth(key);
                }
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return self.extract_text(response, prompt).await;
                }
                Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    warn!(attempt, "Generation rate limit hit, backing off before retry");
                    last_error = GenerationError::Status(429);
                }
                Ok(response) => {
                    // Hard failure: do not burn further attempts
                    return Err(GenerationError::Status(response.status().as_u16()));
                }
                Err(e) if e.is_timeout() => {
                    warn!(attempt, "Generation request timed out, retrying");
                    last_error = GenerationError::Transport(e.to_string());
                }
                Err(e) => return Err(GenerationError::Transport(e.to_string())),
            }
        }

        Err(last_error)
    }

    async fn extract_text(
        &self,
        response: reqwest::Response,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let outputs: Vec<GeneratedText> = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let first = outputs
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Malformed("empty output array".to_string()))?;

        // The endpoint echoes the prompt back as a prefix
        let text = first.generated_text.replace(prompt, "");
        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text.to_string())
    }

    /// Translate text to the requested language; English passes through.
    /// Translation failures are silently absorbed: the original text comes
    /// back untranslated.
    pub async fn translate(&self, text: &str, language: Language) -> String {
        if language == Language::English {
            return text.to_string();
        }

        let prompt = format!("Translate to {}: {}", language.name(), text);
        match self.generate(&prompt).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(language = language.name(), error = %e, "Translation failed, returning original text");
                text.to_string()
            }
        }
    }
}

/// Advice composer backed by the generation service.
pub struct GenerativeComposer {
    client: std::sync::Arc<GenerationClient>,
}

impl GenerativeComposer {
    pub fn new(client: std::sync::Arc<GenerationClient>) -> Self {
        Self { client }
    }

    fn prompt(context: &AdviceContext<'_>) -> String {
        match context {
            AdviceContext::CropRecommendation { crop, soil } => crop_prompt(crop, soil),
            AdviceContext::Diagnosis(diagnosis) => diagnosis_prompt(diagnosis),
            AdviceContext::Chat { message } => chat_prompt(message),
        }
    }
}

#[async_trait]
impl AdviceComposer for GenerativeComposer {
    async fn compose(&self, context: &AdviceContext<'_>) -> String {
        let prompt = Self::prompt(context);
        match self.client.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Generation chain exhausted, returning apology text");
                APOLOGY.to_string()
            }
        }
    }
}

fn crop_prompt(crop: &str, soil: &SoilSample) -> String {
    format!(
        "As an agricultural expert, provide detailed farming advice for {crop} cultivation \
         with these conditions:\n\
         - Soil nutrients: N={}, P={}, K={}, pH={}\n\
         - Weather: Temperature={}C, Humidity={}%, Rainfall={}mm\n\n\
         Include:\n\
         1. Fertilizer recommendations\n\
         2. Irrigation schedule\n\
         3. Pest control measures\n\
         4. Best practices",
        soil.nitrogen,
        soil.phosphorus,
        soil.potassium,
        soil.ph,
        soil.temperature,
        soil.humidity,
        soil.rainfall,
    )
}

fn diagnosis_prompt(diagnosis: &Diagnosis) -> String {
    if diagnosis.is_healthy {
        format!(
            "As a plant pathologist, provide information about a healthy {crop} plant:\n\
             1. Confirm the plant appears healthy\n\
             2. Best practices to maintain plant health\n\
             3. Common diseases to watch for in {crop}\n\
             4. Preventive care recommendations",
            crop = diagnosis.crop
        )
    } else {
        format!(
            "As a plant pathologist, provide detailed information about {} in {}:\n\
             1. Disease description and causes\n\
             2. Common symptoms to look for\n\
             3. Treatment recommendations (organic and chemical)\n\
             4. Prevention measures for future crops\n\
             5. Expected recovery timeline",
            diagnosis.condition, diagnosis.crop
        )
    }
}

fn chat_prompt(message: &str) -> String {
    format!(
        "As KrishiGPT, a friendly agricultural assistant helping farmers, respond to this \
         farming question in simple, clear language:\n\n{message}"
    )
}
