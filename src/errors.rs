use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-fatal failures of the analyze endpoint.
///
/// Nutrition failures never appear here; they degrade to a placeholder inside
/// the resolver.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No image file provided")]
    NoImageProvided,

    #[error("Invalid file type. Only JPEG, PNG, and WebP are allowed.")]
    InvalidUpload,

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("File too large. Maximum size is 10MB.")]
    PayloadTooLarge,

    #[error("Failed to analyze food image: {0}")]
    VisionInference(String),

    #[error("Failed to analyze food image: {0}")]
    MalformedAnalysisJson(String),

    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl AnalyzeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoImageProvided | Self::InvalidUpload | Self::MalformedUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::VisionInference(_) | Self::MalformedAnalysisJson(_) | Self::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::NoImageProvided
            | Self::InvalidUpload
            | Self::MalformedUpload(_)
            | Self::PayloadTooLarge => json!({ "error": self.to_string() }),
            Self::VisionInference(_) | Self::MalformedAnalysisJson(_) => {
                error!(error = %self, "analysis failed");
                json!({
                    "success": false,
                    "error": "Failed to analyze food image",
                    "message": self.to_string(),
                })
            }
            Self::Unhandled(e) => {
                error!(error = ?e, "unhandled error in analyze");
                json!({
                    "success": false,
                    "error": "Internal server error",
                    "message": format!("{:#}", e),
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
