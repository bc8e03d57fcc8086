//! Seam over the language-model endpoint used for image analysis and
//! text-only nutrition estimates.

pub mod openai;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use thiserror::Error;

pub use openai::OpenAiClient;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference API key not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("inference response contained no text")]
    EmptyResponse,

    #[error("inference call timed out after {0}s")]
    Timeout(u64),
}

/// Image sent inline with a prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

impl InlineImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    pub image: Option<InlineImage>,
    pub max_tokens: u32,
}

impl Prompt {
    pub fn text(text: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            text: text.into(),
            image: None,
            max_tokens,
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Sends one prompt and returns the model's raw text reply.
    async fn complete(&self, prompt: Prompt) -> Result<String, InferenceError>;
}
