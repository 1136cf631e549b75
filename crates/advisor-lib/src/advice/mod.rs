//! Advice composition
//!
//! Two interchangeable strategies produce the human-readable guidance that
//! accompanies every prediction: deterministic rule-based templates, or a
//! remote text-generation service with a multi-stage fallback chain. Either
//! way the result is always a non-empty string; no generation failure is
//! fatal to a request.

mod generate;
mod rules;

pub use generate::{GenerationClient, GenerationConfig, GenerationError, GenerativeComposer};
pub use rules::RuleBasedComposer;

use crate::models::{Diagnosis, SoilSample};
use async_trait::async_trait;

/// Floor of the generation fallback chain; returned verbatim when every
/// other path has failed.
pub const APOLOGY: &str = "I apologize, but I'm having trouble generating a response right now. \
                           Please try again later.";

/// What the advice should be about.
pub enum AdviceContext<'a> {
    /// A crop recommendation together with the soil that produced it.
    CropRecommendation {
        crop: &'a str,
        soil: &'a SoilSample,
    },
    /// A parsed disease (or healthy) diagnosis.
    Diagnosis(&'a Diagnosis),
    /// A free-form farming question.
    Chat { message: &'a str },
}

/// Strategy for turning a structured result into guidance text.
#[async_trait]
pub trait AdviceComposer: Send + Sync {
    /// Compose advice for the given context. Infallible by contract: a
    /// composer that cannot produce anything better returns [`APOLOGY`].
    async fn compose(&self, context: &AdviceContext<'_>) -> String;
}
