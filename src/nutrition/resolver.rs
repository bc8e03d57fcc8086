use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{NutritionDatabase, NutritionError, NutritionInfo, NutritionSource};
use crate::analysis::parser::{lenient_number, parse_model_json, round1};
use crate::inference::{InferenceClient, InferenceError, Prompt};

const ESTIMATE_MAX_TOKENS: u32 = 200;

/// Result of resolving nutrition for one identified food.
#[derive(Debug, Clone, PartialEq)]
pub enum NutritionOutcome {
    Found(NutritionInfo),
    EstimatedFallback(NutritionInfo),
    Unavailable,
}

impl NutritionOutcome {
    /// Collapses the outcome into what the client sees; never empty.
    pub fn into_info(self) -> NutritionInfo {
        match self {
            Self::Found(info) | Self::EstimatedFallback(info) => info,
            Self::Unavailable => NutritionInfo::placeholder(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Estimate {
    #[serde(default, alias = "kcal", deserialize_with = "lenient_number")]
    calories: Option<f64>,
    #[serde(default, alias = "protein_g", deserialize_with = "lenient_number")]
    protein: Option<f64>,
    #[serde(default, alias = "carbs_g", alias = "carbohydrates", deserialize_with = "lenient_number")]
    carbs: Option<f64>,
    #[serde(default, alias = "fat_g", deserialize_with = "lenient_number")]
    fat: Option<f64>,
}

impl From<Estimate> for NutritionInfo {
    fn from(e: Estimate) -> Self {
        Self {
            food_name: None,
            calories: e.calories.unwrap_or_default().round() as i64,
            protein: round1(e.protein.unwrap_or_default()),
            carbs: round1(e.carbs.unwrap_or_default()),
            fat: round1(e.fat.unwrap_or_default()),
            serving_weight_grams: None,
            serving_unit: None,
            photo: None,
            source: NutritionSource::Estimated,
            note: None,
        }
    }
}

/// Portion count used for the database query: positive and finite, else 1.
pub fn effective_portions(portions: Option<f64>) -> f64 {
    portions.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(1.0)
}

pub fn lookup_phrase(food_name: &str, portions: Option<f64>) -> String {
    format!("{} serving of {}", effective_portions(portions), food_name)
}

pub fn estimate_prompt(food_name: &str, weight_grams: Option<f64>) -> String {
    let amount = match weight_grams.filter(|w| w.is_finite() && *w > 0.0) {
        Some(w) => format!("{}g of {}", w.round(), food_name),
        None => format!("one typical serving of {}", food_name),
    };
    format!(
        "Estimate the nutrition information for {amount}.\n\
         Provide a JSON response with:\n\
         - calories (kcal)\n\
         - protein (g)\n\
         - carbs (g)\n\
         - fat (g)\n\n\
         Be as accurate as possible based on typical nutrition values. Return ONLY valid JSON."
    )
}

/// Database lookup first, model estimate second, `Unavailable` last.
pub struct NutritionResolver {
    database: Arc<dyn NutritionDatabase>,
    inference: Arc<dyn InferenceClient>,
    lookup_timeout: Duration,
    estimate_timeout: Duration,
}

impl NutritionResolver {
    pub fn new(
        database: Arc<dyn NutritionDatabase>,
        inference: Arc<dyn InferenceClient>,
        lookup_timeout: Duration,
        estimate_timeout: Duration,
    ) -> Self {
        Self {
            database,
            inference,
            lookup_timeout,
            estimate_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        food_name: &str,
        portions: Option<f64>,
        weight_grams: Option<f64>,
    ) -> NutritionOutcome {
        match self.lookup(food_name, portions).await {
            Ok(Some(info)) => return NutritionOutcome::Found(info),
            Ok(None) => info!("no database match, estimating nutrition"),
            Err(e) => warn!(error = %e, "nutrition lookup failed, estimating nutrition"),
        }

        match self.estimate(food_name, weight_grams).await {
            Ok(info) => NutritionOutcome::EstimatedFallback(info),
            Err(e) => {
                warn!(error = %e, "nutrition estimate failed");
                NutritionOutcome::Unavailable
            }
        }
    }

    async fn lookup(
        &self,
        food_name: &str,
        portions: Option<f64>,
    ) -> Result<Option<NutritionInfo>, NutritionError> {
        let query = lookup_phrase(food_name, portions);
        let foods = tokio::time::timeout(self.lookup_timeout, self.database.natural_nutrients(&query))
            .await
            .map_err(|_| NutritionError::Timeout(self.lookup_timeout.as_secs()))??;
        Ok(foods.into_iter().next().map(NutritionInfo::from))
    }

    async fn estimate(
        &self,
        food_name: &str,
        weight_grams: Option<f64>,
    ) -> Result<NutritionInfo, NutritionError> {
        let prompt = Prompt::text(estimate_prompt(food_name, weight_grams), ESTIMATE_MAX_TOKENS);
        let reply = tokio::time::timeout(self.estimate_timeout, self.inference.complete(prompt))
            .await
            .unwrap_or(Err(InferenceError::Timeout(self.estimate_timeout.as_secs())))
            .map_err(|e| NutritionError::Fallback(e.to_string()))?;
        let estimate: Estimate =
            parse_model_json(&reply).map_err(|e| NutritionError::Fallback(e.to_string()))?;
        if estimate.calories.is_none() {
            return Err(NutritionError::Fallback("estimate has no calories".into()));
        }
        Ok(estimate.into())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::nutrition::FoodRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Nutrition database fake returning a canned result and recording queries.
    pub(crate) struct FakeDatabase {
        pub result: Mutex<Option<Result<Vec<FoodRecord>, NutritionError>>>,
        pub queries: Mutex<Vec<String>>,
        pub delay: Option<Duration>,
    }

    impl FakeDatabase {
        pub(crate) fn returning(result: Result<Vec<FoodRecord>, NutritionError>) -> Self {
            Self {
                result: Mutex::new(Some(result)),
                queries: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        pub(crate) fn bibimbap() -> Self {
            Self::returning(Ok(vec![FoodRecord {
                food_name: Some("bibimbap".into()),
                nf_calories: Some(589.6),
                nf_protein: Some(24.44),
                nf_total_carbohydrate: Some(84.06),
                nf_total_fat: Some(16.71),
                serving_weight_grams: Some(449.6),
                serving_unit: Some("bowl".into()),
                photo: None,
            }]))
        }
    }

    #[async_trait]
    impl NutritionDatabase for FakeDatabase {
        async fn natural_nutrients(&self, query: &str) -> Result<Vec<FoodRecord>, NutritionError> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Inference fake answering each call from a queue of canned replies.
    pub(crate) struct FakeInference {
        pub replies: Mutex<Vec<Result<String, InferenceError>>>,
        pub prompts: Mutex<Vec<Prompt>>,
    }

    impl FakeInference {
        pub(crate) fn with_replies(replies: Vec<Result<String, InferenceError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InferenceClient for FakeInference {
        async fn complete(&self, prompt: Prompt) -> Result<String, InferenceError> {
            self.prompts.lock().unwrap().push(prompt);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err(InferenceError::EmptyResponse)
            } else {
                replies.remove(0)
            }
        }
    }

    fn resolver(db: Arc<FakeDatabase>, ai: Arc<FakeInference>) -> NutritionResolver {
        NutritionResolver::new(db, ai, Duration::from_secs(5), Duration::from_secs(5))
    }

    #[test]
    fn portions_default_to_one() {
        assert_eq!(effective_portions(None), 1.0);
        assert_eq!(effective_portions(Some(0.0)), 1.0);
        assert_eq!(effective_portions(Some(-2.0)), 1.0);
        assert_eq!(effective_portions(Some(f64::NAN)), 1.0);
        assert_eq!(effective_portions(Some(2.0)), 2.0);
    }

    #[test]
    fn lookup_phrase_formats_portions() {
        assert_eq!(lookup_phrase("bibimbap", Some(1.0)), "1 serving of bibimbap");
        assert_eq!(lookup_phrase("pizza", Some(1.5)), "1.5 serving of pizza");
        assert_eq!(lookup_phrase("pizza", None), "1 serving of pizza");
    }

    #[test]
    fn estimate_prompt_mentions_weight_when_known() {
        assert!(estimate_prompt("ramen", Some(520.4)).contains("520g of ramen"));
        assert!(estimate_prompt("ramen", None).contains("one typical serving of ramen"));
    }

    #[tokio::test]
    async fn database_match_is_found() {
        let db = Arc::new(FakeDatabase::bibimbap());
        let ai = Arc::new(FakeInference::with_replies(vec![]));
        let outcome = resolver(db.clone(), ai.clone())
            .resolve("bibimbap", Some(1.0), Some(450.0))
            .await;

        let NutritionOutcome::Found(info) = outcome else {
            panic!("expected a database match");
        };
        assert_eq!(info.calories, 590);
        assert_eq!(info.protein, 24.4);
        assert_eq!(info.carbs, 84.1);
        assert_eq!(info.fat, 16.7);
        assert_eq!(info.serving_weight_grams, Some(450));
        assert_eq!(db.queries.lock().unwrap().as_slice(), ["1 serving of bibimbap"]);
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn empty_result_falls_back_to_estimate() {
        let db = Arc::new(FakeDatabase::returning(Ok(vec![])));
        let ai = Arc::new(FakeInference::with_replies(vec![Ok(
            "```json\n{\"calories\": 612.4, \"protein\": \"25.26\", \"carbs\": 80, \"fat\": 18.04}\n```".into(),
        )]));
        let outcome = resolver(db, ai.clone()).resolve("bibimbap", None, Some(450.0)).await;

        let NutritionOutcome::EstimatedFallback(info) = outcome else {
            panic!("expected an estimate");
        };
        assert_eq!(info.calories, 612);
        assert_eq!(info.protein, 25.3);
        assert_eq!(info.carbs, 80.0);
        assert_eq!(info.fat, 18.0);
        assert_eq!(info.source, NutritionSource::Estimated);

        let prompts = ai.prompts.lock().unwrap();
        assert!(prompts[0].image.is_none());
        assert_eq!(prompts[0].max_tokens, 200);
        assert!(prompts[0].text.contains("450g of bibimbap"));
    }

    #[tokio::test]
    async fn database_error_falls_back_to_estimate() {
        let db = Arc::new(FakeDatabase::returning(Err(NutritionError::Api {
            status: 404,
            body: "We couldn't match any of your foods".into(),
        })));
        let ai = Arc::new(FakeInference::with_replies(vec![Ok(
            r#"{"calories": 300, "protein": 10, "carbs": 40, "fat": 9}"#.into(),
        )]));
        let outcome = resolver(db, ai).resolve("toast", Some(2.0), None).await;
        assert!(matches!(outcome, NutritionOutcome::EstimatedFallback(_)));
    }

    #[tokio::test]
    async fn slow_database_times_out_into_fallback() {
        let mut db = FakeDatabase::bibimbap();
        db.delay = Some(Duration::from_millis(200));
        let ai = Arc::new(FakeInference::with_replies(vec![Ok(r#"{"calories": 1}"#.into())]));
        let resolver = NutritionResolver::new(
            Arc::new(db),
            ai,
            Duration::from_millis(10),
            Duration::from_secs(5),
        );
        let outcome = resolver.resolve("bibimbap", Some(1.0), None).await;
        assert!(matches!(outcome, NutritionOutcome::EstimatedFallback(_)));
    }

    #[tokio::test]
    async fn both_paths_failing_is_unavailable() {
        let db = Arc::new(FakeDatabase::returning(Err(NutritionError::NotConfigured)));
        let ai = Arc::new(FakeInference::with_replies(vec![Ok("I think about 500 kcal".into())]));
        let outcome = resolver(db, ai).resolve("mystery stew", None, None).await;
        assert_eq!(outcome, NutritionOutcome::Unavailable);

        let info = outcome.into_info();
        assert_eq!(info.calories, 0);
        assert_eq!(info.note.as_deref(), Some(NutritionInfo::UNAVAILABLE_NOTE));
    }

    #[tokio::test]
    async fn estimate_without_values_is_unavailable() {
        for reply in [
            "{}",
            r#"{"nutrition": {"calories": 520, "protein": 20, "carbs": 70, "fat": 15}}"#,
            r#"{"protein": 20, "carbs": 70, "fat": 15}"#,
        ] {
            let db = Arc::new(FakeDatabase::returning(Ok(vec![])));
            let ai = Arc::new(FakeInference::with_replies(vec![Ok(reply.into())]));
            let outcome = resolver(db, ai).resolve("bibimbap", None, Some(450.0)).await;
            assert_eq!(outcome, NutritionOutcome::Unavailable, "reply: {reply}");
            assert_eq!(
                outcome.into_info().note.as_deref(),
                Some(NutritionInfo::UNAVAILABLE_NOTE)
            );
        }
    }

    #[tokio::test]
    async fn estimate_call_error_is_unavailable() {
        let db = Arc::new(FakeDatabase::returning(Ok(vec![])));
        let ai = Arc::new(FakeInference::with_replies(vec![Err(InferenceError::Api {
            status: 500,
            body: "overloaded".into(),
        })]));
        let outcome = resolver(db, ai).resolve("soup", None, None).await;
        assert_eq!(outcome, NutritionOutcome::Unavailable);
    }
}
