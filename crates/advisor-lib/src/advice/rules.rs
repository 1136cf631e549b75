//! Rule-based advice strategy
//!
//! Deterministic string templates keyed on nutrient thresholds and on the
//! diagnosis health flag. No external calls; always succeeds.

use super::{AdviceComposer, AdviceContext};
use crate::models::{Diagnosis, SoilSample};
use async_trait::async_trait;

// Nutrient thresholds in mg/kg, matched to the ranges the crop dataset
// was collected over.
const NITROGEN_LOW: f32 = 50.0;
const NITROGEN_HIGH: f32 = 100.0;
const PHOSPHORUS_LOW: f32 = 30.0;
const PHOSPHORUS_HIGH: f32 = 100.0;
const POTASSIUM_LOW: f32 = 30.0;
const POTASSIUM_HIGH: f32 = 100.0;
const PH_ACIDIC: f32 = 6.0;
const PH_ALKALINE: f32 = 8.0;

/// Offline advice composer.
pub struct RuleBasedComposer;

impl RuleBasedComposer {
    fn crop_advice(crop: &str, soil: &SoilSample) -> String {
        let mut advice = format!("Based on your soil parameters, {crop} is recommended.\n\n");

        if soil.nitrogen < NITROGEN_LOW {
            advice.push_str("- Nitrogen (N) is low. Consider adding nitrogen-rich fertilizers.\n");
        } else if soil.nitrogen > NITROGEN_HIGH {
            advice.push_str("- Nitrogen (N) is high. Reduce nitrogen fertilization.\n");
        }

        if soil.phosphorus < PHOSPHORUS_LOW {
            advice.push_str("- Phosphorus (P) is low. Add phosphate fertilizers.\n");
        } else if soil.phosphorus > PHOSPHORUS_HIGH {
            advice.push_str("- Phosphorus (P) is high. Reduce phosphate application.\n");
        }

        if soil.potassium < POTASSIUM_LOW {
            advice.push_str("- Potassium (K) is low. Add potash fertilizers.\n");
        } else if soil.potassium > POTASSIUM_HIGH {
            advice.push_str("- Potassium (K) is high. Reduce potassium application.\n");
        }

        if soil.ph < PH_ACIDIC {
            advice.push_str("- Soil is acidic. Consider adding lime to raise pH.\n");
        } else if soil.ph > PH_ALKALINE {
            advice.push_str("- Soil is alkaline. Consider adding sulfur to lower pH.\n");
        }

        advice.push_str(&format!(
            "\nGeneral care for {crop}:\n\
             1. Prepare the soil well before planting\n\
             2. Maintain proper spacing between plants\n\
             3. Monitor for pests and diseases regularly\n\
             4. Maintain soil moisture appropriate for {crop}\n"
        ));

        advice
    }

    fn diagnosis_advice(diagnosis: &Diagnosis) -> String {
        if diagnosis.is_healthy {
            format!(
                "Your {} plant appears healthy!\n\n\
                 Maintenance tips:\n\
                 1. Continue regular watering schedule\n\
                 2. Ensure adequate sunlight (6-8 hours daily)\n\
                 3. Monitor for early signs of pests or disease\n\
                 4. Maintain good air circulation\n\
                 5. Apply balanced fertilizer as needed",
                diagnosis.crop
            )
        } else {
            format!(
                "{} detected in {}\n\n\
                 Treatment recommendations:\n\
                 1. Remove and destroy affected leaves\n\
                 2. Apply appropriate fungicide or treatment\n\
                 3. Improve air circulation around plants\n\
                 4. Avoid overhead watering\n\
                 5. Monitor other plants for spread\n\n\
                 Consult a local agricultural expert for specific treatment options.",
                diagnosis.condition, diagnosis.crop
            )
        }
    }

    fn chat_advice() -> String {
        "I can help with crop selection and plant disease questions. \
         Submit your soil readings for a crop recommendation, or upload a clear \
         photo of a plant leaf to check it for disease."
            .to_string()
    }
}

#[async_trait]
impl AdviceComposer for RuleBasedComposer {
    async fn compose(&self, context: &AdviceContext<'_>) -> String {
        match context {
            AdviceContext::CropRecommendation { crop, soil } => Self::crop_advice(crop, soil),
            AdviceContext::Diagnosis(diagnosis) => Self::diagnosis_advice(diagnosis),
            AdviceContext::Chat { .. } => Self::chat_advice(),
        }
    }
}
