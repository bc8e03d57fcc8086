use std::fmt;

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::dto::AnalysisResult;
use crate::errors::AnalyzeError;
use crate::state::AppState;
use crate::storage::UploadedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Analyzing,
    ResolvingNutrition,
    Responding,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Analyzing => "analyzing",
            Stage::ResolvingNutrition => "resolving_nutrition",
            Stage::Responding => "responding",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Runs one upload through vision analysis and nutrition resolution.
///
/// The upload is released before this returns, whatever the outcome.
pub async fn analyze_upload(
    st: &AppState,
    upload: Option<UploadedImage>,
) -> Result<AnalysisResult, AnalyzeError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("analysis", %request_id);

    async move {
        info!(stage = %Stage::Received, "analysis started");
        let Some(upload) = upload else {
            info!(stage = %Stage::Failed, "no image provided");
            return Err(AnalyzeError::NoImageProvided);
        };

        let outcome = run_pipeline(st, &upload).await;
        upload.release().await;

        match &outcome {
            Ok(_) => info!(stage = %Stage::Succeeded, "analysis finished"),
            Err(e) => info!(stage = %Stage::Failed, error = %e, "analysis failed"),
        }
        outcome
    }
    .instrument(span)
    .await
}

async fn run_pipeline(st: &AppState, upload: &UploadedImage) -> Result<AnalysisResult, AnalyzeError> {
    let data = upload.read().await?;

    info!(stage = %Stage::Analyzing, mime = %upload.mime_type, size = upload.size, "analyzing image");
    let analysis = st.vision.analyze(data, &upload.mime_type).await?;
    info!(food = %analysis.food_name, "image identified");

    info!(stage = %Stage::ResolvingNutrition, "resolving nutrition");
    let nutrition = st
        .nutrition
        .resolve(
            &analysis.food_name,
            analysis.estimated_portions,
            analysis.estimated_weight_grams,
        )
        .await
        .into_info();

    info!(stage = %Stage::Responding, source = ?nutrition.source, "composing result");
    Ok(AnalysisResult {
        success: true,
        analysis,
        nutrition,
    })
}
