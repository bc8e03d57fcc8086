use serde::{Deserialize, Serialize};

use super::parser::lenient_number;
use crate::nutrition::NutritionInfo;

/// What the vision model identified in the photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodAnalysis {
    pub food_name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub estimated_weight_grams: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub estimated_portions: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub analysis: FoodAnalysis,
    pub nutrition: NutritionInfo,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}
