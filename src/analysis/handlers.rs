use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{AnalysisResult, HealthResponse};
use super::services::analyze_upload;
use crate::config::MAX_UPLOAD_BYTES;
use crate::errors::AnalyzeError;
use crate::state::AppState;
use crate::storage::UploadedImage;

const IMAGE_FIELD: &str = "image";
const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

// room for multipart boundaries and headers on top of the file itself
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Server is running",
    })
}

/// POST /analyze (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn analyze(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResult>, AnalyzeError> {
    // a body that is not multipart at all carries no image
    let upload = match mp {
        Ok(mp) => receive_image(&state, mp).await?,
        Err(rejection) => {
            warn!(error = %rejection, "analyze called without multipart body");
            None
        }
    };
    let result = analyze_upload(&state, upload).await?;
    Ok(Json(result))
}

/// Validates and stores the `image` field. Nothing leaves the process before
/// this succeeds.
async fn receive_image(
    state: &AppState,
    mut mp: Multipart,
) -> Result<Option<UploadedImage>, AnalyzeError> {
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
        if !ALLOWED_TYPES.contains(&content_type.as_str()) {
            warn!(%content_type, "rejected upload type");
            return Err(AnalyzeError::InvalidUpload);
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > state.config.max_upload_bytes {
            warn!(size = data.len(), "rejected oversized upload");
            return Err(AnalyzeError::PayloadTooLarge);
        }

        let stored = state
            .uploads
            .put_object(&file_name, data, &content_type)
            .await?;
        return Ok(Some(stored));
    }
    Ok(None)
}

fn multipart_error(e: MultipartError) -> AnalyzeError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalyzeError::PayloadTooLarge
    } else {
        AnalyzeError::MalformedUpload(e.body_text())
    }
}
