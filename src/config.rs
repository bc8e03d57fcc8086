use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NutritionixConfig {
    pub app_id: Option<String>,
    pub app_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl NutritionixConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.app_id.as_deref(), self.app_key.as_deref()) {
            (Some(id), Some(key)) => Some((id, key)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub openai: OpenAiConfig,
    pub nutritionix: NutritionixConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT").or_else(|| var("APP_PORT")) {
            Some(p) => p
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("invalid port {p:?}: {e}"))?,
            None => 3001,
        };

        let upload_dir = match var("UPLOAD_DIR") {
            Some(dir) => PathBuf::from(dir),
            None if var("VERCEL").is_some() => std::env::temp_dir().join("food-analyzer-uploads"),
            None => PathBuf::from("uploads"),
        };

        let openai = OpenAiConfig {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into()),
            model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".into()),
            timeout_secs: var("INFERENCE_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };

        let nutritionix = NutritionixConfig {
            app_id: var("NUTRITIONIX_APP_ID"),
            app_key: var("NUTRITIONIX_APP_KEY"),
            base_url: var("NUTRITIONIX_BASE_URL")
                .unwrap_or_else(|| "https://trackapi.nutritionix.com".into()),
            timeout_secs: var("NUTRITION_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15),
        };

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            upload_dir,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            openai,
            nutritionix,
        })
    }

    /// Logs a warning for every missing credential. Missing keys are not fatal.
    pub fn warn_missing_credentials(&self) {
        if self.openai.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not configured; image analysis will fail");
        }
        if self.nutritionix.credentials().is_none() {
            tracing::warn!("Nutritionix credentials not configured; nutrition will be estimated");
        }
    }
}
