use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FoodRecord, NutritionDatabase, NutritionError};
use crate::config::NutritionixConfig;

#[derive(Debug, Serialize)]
struct NaturalQuery<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct NaturalResponse {
    #[serde(default)]
    foods: Vec<FoodRecord>,
}

/// Client for the Nutritionix natural-language nutrients endpoint.
#[derive(Clone)]
pub struct NutritionixClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl NutritionixClient {
    pub fn new(config: &NutritionixConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config
                .credentials()
                .map(|(id, key)| (id.to_string(), key.to_string())),
        })
    }
}

#[async_trait]
impl NutritionDatabase for NutritionixClient {
    async fn natural_nutrients(&self, query: &str) -> Result<Vec<FoodRecord>, NutritionError> {
        let (app_id, app_key) = self
            .credentials
            .as_ref()
            .ok_or(NutritionError::NotConfigured)?;

        debug!(%query, "querying nutritionix");
        let response = self
            .client
            .post(format!("{}/v2/natural/nutrients", self.base_url))
            .header("x-app-id", app_id)
            .header("x-app-key", app_key)
            .json(&NaturalQuery { query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "nutritionix lookup failed");
            return Err(NutritionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: NaturalResponse = response.json().await?;
        Ok(parsed.foods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: Option<&str>, key: Option<&str>) -> NutritionixConfig {
        NutritionixConfig {
            app_id: id.map(Into::into),
            app_key: key.map(Into::into),
            base_url: "http://localhost:9/".into(),
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let client = NutritionixClient::new(&config(Some("id"), None)).unwrap();
        let err = client.natural_nutrients("1 serving of rice").await.unwrap_err();
        assert!(matches!(err, NutritionError::NotConfigured));
    }

    #[test]
    fn response_without_foods_is_empty() {
        let parsed: NaturalResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.foods.is_empty());
    }

    #[test]
    fn response_foods_are_parsed() {
        let body = r#"{"foods":[{"food_name":"pizza","nf_calories":285.0,"nf_protein":12.2,
            "nf_total_carbohydrate":35.7,"nf_total_fat":10.4,"serving_weight_grams":107,
            "serving_unit":"slice","photo":{"thumb":"t.jpg","highres":null}}]}"#;
        let parsed: NaturalResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.foods.len(), 1);
        assert_eq!(parsed.foods[0].food_name.as_deref(), Some("pizza"));
        assert_eq!(parsed.foods[0].serving_weight_grams, Some(107.0));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = NutritionixClient::new(&config(Some("id"), Some("key"))).unwrap();
        assert_eq!(client.base_url, "http://localhost:9");
        assert!(client.credentials.is_some());
    }
}
