use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{CompletionClient, CompletionOptions, ImageGenerator};
use crate::error::{truncate_for_log, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

fn build_http(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(concat!("sheet-enricher/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Pull `choices[0].message.content` out of a chat completion payload.
pub fn extract_chat_text(body: &Value) -> Option<String> {
    body.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pull `data[0].url` out of an image generation payload.
pub fn extract_image_url(body: &Value) -> Option<String> {
    body.get("data")?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
}

async fn post_json(
    http: &Client,
    url: &str,
    api_key: &str,
    payload: &Value,
) -> Result<Value, ProviderError> {
    let resp = http
        .post(url)
        .bearer_auth(api_key)
        .json(payload)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
        return Err(ProviderError::from_status(status, body));
    }
    Ok(resp.json().await?)
}

/// OpenAI-compatible `/v1/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    http: Client,
}

impl OpenAiChat {
    pub fn new(api_key: String, base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            http: build_http(timeout_secs)?,
        })
    }

    fn payload(prompt: &str, options: &CompletionOptions) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = options.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut payload = json!({
            "model": options.model,
            "messages": messages,
            "temperature": options.temperature,
        });
        if let Some(max) = options.max_tokens {
            payload["max_tokens"] = json!(max);
        }
        payload
    }
}

#[async_trait]
impl CompletionClient for OpenAiChat {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = post_json(&self.http, &url, &self.api_key, &Self::payload(prompt, options)).await?;
        extract_chat_text(&body).ok_or_else(|| {
            ProviderError::EmptyResponse(truncate_for_log(body.to_string(), 500))
        })
    }
}

/// OpenAI `/v1/images/generations` client returning hosted image URLs.
#[derive(Debug, Clone)]
pub struct OpenAiImages {
    base_url: String,
    api_key: String,
    http: Client,
}

impl OpenAiImages {
    pub fn new(api_key: String, base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            http: build_http(timeout_secs)?,
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImages {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/images/generations", self.base_url);
        let payload = json!({
            "model": IMAGE_MODEL,
            "prompt": prompt,
            "n": 1,
            "size": IMAGE_SIZE,
            "response_format": "url",
        });
        let body = post_json(&self.http, &url, &self.api_key, &payload).await?;
        extract_image_url(&body).ok_or_else(|| {
            ProviderError::EmptyResponse(truncate_for_log(body.to_string(), 500))
        })
    }
}
