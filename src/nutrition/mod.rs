pub mod nutritionix;
pub mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::parser::round1;

pub use nutritionix::NutritionixClient;
pub use resolver::NutritionResolver;

/// Recoverable nutrition failures. Logged, never returned to the client.
#[derive(Debug, Error)]
pub enum NutritionError {
    #[error("nutrition database credentials not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("nutrition database returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("nutrition lookup timed out after {0}s")]
    Timeout(u64),

    #[error("nutrition estimate failed: {0}")]
    Fallback(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NutritionSource {
    Database,
    Estimated,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    pub calories: i64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_weight_grams: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub source: NutritionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NutritionInfo {
    pub const UNAVAILABLE_NOTE: &'static str = "Nutrition information not available";

    pub fn placeholder() -> Self {
        Self {
            food_name: None,
            calories: 0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
            serving_weight_grams: None,
            serving_unit: None,
            photo: None,
            source: NutritionSource::Unavailable,
            note: Some(Self::UNAVAILABLE_NOTE.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoodPhoto {
    pub thumb: Option<String>,
}

/// One matched food from the nutrition database.
#[derive(Debug, Clone, Deserialize)]
pub struct FoodRecord {
    pub food_name: Option<String>,
    pub nf_calories: Option<f64>,
    pub nf_protein: Option<f64>,
    pub nf_total_carbohydrate: Option<f64>,
    pub nf_total_fat: Option<f64>,
    pub serving_weight_grams: Option<f64>,
    pub serving_unit: Option<String>,
    pub photo: Option<FoodPhoto>,
}

impl From<FoodRecord> for NutritionInfo {
    fn from(r: FoodRecord) -> Self {
        Self {
            food_name: r.food_name,
            calories: r.nf_calories.unwrap_or_default().round() as i64,
            protein: round1(r.nf_protein.unwrap_or_default()),
            carbs: round1(r.nf_total_carbohydrate.unwrap_or_default()),
            fat: round1(r.nf_total_fat.unwrap_or_default()),
            serving_weight_grams: r.serving_weight_grams.map(|w| w.round() as i64),
            serving_unit: r.serving_unit,
            photo: r.photo.and_then(|p| p.thumb),
            source: NutritionSource::Database,
            note: None,
        }
    }
}

#[async_trait]
pub trait NutritionDatabase: Send + Sync {
    /// Looks up foods matching a natural-language phrase such as "1 serving of pizza".
    async fn natural_nutrients(&self, query: &str) -> Result<Vec<FoodRecord>, NutritionError>;
}
