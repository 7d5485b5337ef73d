// External generation backends: chat completions, image generation, file storage.

pub mod image;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use image::ImageToStorage;
pub use openai::{OpenAiChat, OpenAiImages};

/// Per-job knobs forwarded to the completion backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: None,
            system: None,
        }
    }
}

/// Prompt in, text out. The batch processor drives every job through this.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;
}

/// Prompt in, URL of a generated image out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Persists a remote object and returns a public URL for it.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn store_from_url(
        &self,
        source_url: &str,
        file_name: &str,
    ) -> Result<String, ProviderError>;
}
