use crate::analysis::vision::VisionAnalyzer;
use crate::config::AppConfig;
use crate::inference::{InferenceClient, OpenAiClient};
use crate::nutrition::{NutritionDatabase, NutritionResolver, NutritionixClient};
use crate::storage::UploadStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub uploads: UploadStore,
    pub vision: Arc<VisionAnalyzer>,
    pub nutrition: Arc<NutritionResolver>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        config.warn_missing_credentials();

        let inference = Arc::new(OpenAiClient::new(&config.openai)?) as Arc<dyn InferenceClient>;
        let database =
            Arc::new(NutritionixClient::new(&config.nutritionix)?) as Arc<dyn NutritionDatabase>;

        Self::from_parts(config, inference, database).await
    }

    pub async fn from_parts(
        config: AppConfig,
        inference: Arc<dyn InferenceClient>,
        database: Arc<dyn NutritionDatabase>,
    ) -> anyhow::Result<Self> {
        let uploads = UploadStore::new(&config.upload_dir).await?;
        let vision = Arc::new(VisionAnalyzer::new(inference.clone(), config.openai.timeout()));
        let nutrition = Arc::new(NutritionResolver::new(
            database,
            inference,
            config.nutritionix.timeout(),
            config.openai.timeout(),
        ));

        Ok(Self {
            config: Arc::new(config),
            uploads,
            vision,
            nutrition,
        })
    }

    #[cfg(test)]
    pub async fn for_tests(
        upload_dir: &std::path::Path,
        inference: Arc<dyn InferenceClient>,
        database: Arc<dyn NutritionDatabase>,
    ) -> Self {
        let mut config = AppConfig::from_lookup(|_| None).expect("default config");
        config.upload_dir = upload_dir.to_path_buf();
        config.openai.timeout_secs = 5;
        config.nutritionix.timeout_secs = 5;
        Self::from_parts(config, inference, database)
            .await
            .expect("test state")
    }
}
