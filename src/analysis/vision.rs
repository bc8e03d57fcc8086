use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, instrument};

use super::dto::FoodAnalysis;
use super::parser::parse_model_json;
use crate::errors::AnalyzeError;
use crate::inference::{InferenceClient, InferenceError, InlineImage, Prompt};

const VISION_MAX_TOKENS: u32 = 1000;

pub const VISION_PROMPT: &str = "Analyze this food image and provide detailed information in JSON format. Include:
- food_name: The name of the food in English (e.g., \"bibimbap\", \"pizza\")
- estimated_weight_grams: Estimated weight in grams
- estimated_portions: Number of servings/portions
- description: Brief description of the dish
- ingredients: List of main ingredients you can identify

Be as accurate as possible. Return ONLY valid JSON without any markdown formatting or code blocks.";

/// Identifies the food in an image with one inference call.
pub struct VisionAnalyzer {
    inference: Arc<dyn InferenceClient>,
    timeout: Duration,
}

impl VisionAnalyzer {
    pub fn new(inference: Arc<dyn InferenceClient>, timeout: Duration) -> Self {
        Self { inference, timeout }
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn analyze(&self, data: Bytes, mime_type: &str) -> Result<FoodAnalysis, AnalyzeError> {
        let prompt = Prompt::text(VISION_PROMPT, VISION_MAX_TOKENS).with_image(InlineImage {
            mime_type: normalize_mime(mime_type).to_string(),
            data,
        });

        let reply = tokio::time::timeout(self.timeout, self.inference.complete(prompt))
            .await
            .unwrap_or(Err(InferenceError::Timeout(self.timeout.as_secs())))
            .map_err(|e| AnalyzeError::VisionInference(e.to_string()))?;
        debug!(reply = %reply, "vision reply");

        parse_model_json::<FoodAnalysis>(&reply)
            .map_err(|e| AnalyzeError::MalformedAnalysisJson(e.to_string()))
    }
}

fn normalize_mime(mime_type: &str) -> &str {
    match mime_type {
        "image/jpg" => "image/jpeg",
        other => other,
    }
}
