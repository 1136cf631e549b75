//! AgriMind advisory server
//!
//! Serves the crop recommendation and plant disease detection models behind
//! a JSON API, with advice composition, optional translation, and
//! best-effort interaction history.

use advisor_lib::advice::{
    AdviceComposer, GenerationClient, GenerationConfig, GenerativeComposer, RuleBasedComposer,
};
use advisor_lib::health::Collaborators;
use advisor_lib::history::HistoryStore;
use advisor_lib::{AdvisoryService, ModelRegistry, ServiceMetrics};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

use config::{AdviceMode, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting agrimind-server");

    let config = ServerConfig::load()?;
    info!(
        model_dir = %config.model_dir,
        disease_input_size = config.disease_input_size,
        advice_mode = ?config.advice_mode,
        "Server configured"
    );

    // Load both models; each failure leaves its endpoint returning 503
    // without stopping the process
    let registry = Arc::new(ModelRegistry::load(&config.registry_config()));

    let metrics = ServiceMetrics::new();
    metrics.set_model_loaded("crop", registry.crop_available());
    metrics.set_model_loaded("disease", registry.disease_available());

    let generation = config.generation_url.as_ref().map(|url| {
        let mut generation_config = GenerationConfig::new(url.clone());
        generation_config.fallback_url = config.generation_fallback_url.clone();
        generation_config.api_key = config.generation_api_key.clone();
        generation_config.timeout = Duration::from_secs(config.generation_timeout_secs);
        Arc::new(GenerationClient::new(generation_config))
    });

    let composer: Arc<dyn AdviceComposer> = match (config.advice_mode, &generation) {
        (AdviceMode::Generative, Some(client)) => Arc::new(GenerativeComposer::new(client.clone())),
        _ => Arc::new(RuleBasedComposer),
    };

    let history = Arc::new(HistoryStore::new(
        config.history_url.clone(),
        Duration::from_secs(config.history_timeout_secs),
    ));

    let collaborators = Collaborators {
        generation_configured: generation.is_some(),
        history_configured: history.is_enabled(),
    };

    let service = Arc::new(AdvisoryService::new(
        registry,
        composer,
        generation,
        history,
        config.confidence_floor,
    ));

    let app_state = Arc::new(api::AppState::new(service, collaborators));

    // Start the API server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received, shutting down");
        }
        result = api_handle => {
            result??;
        }
    }

    Ok(())
}
