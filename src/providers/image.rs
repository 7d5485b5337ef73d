use std::sync::Arc;

use async_trait::async_trait;

use super::{CompletionClient, CompletionOptions, FileStore, ImageGenerator};
use crate::error::ProviderError;

/// Image jobs: generate an image for the prompt, persist it, and "complete"
/// with the stored object's public URL.
pub struct ImageToStorage {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<dyn FileStore>,
}

impl ImageToStorage {
    pub fn new(generator: Arc<dyn ImageGenerator>, store: Arc<dyn FileStore>) -> Self {
        Self { generator, store }
    }
}

/// `<first 30 chars of prompt, whitespace as _>_<8 hex>.png`
pub fn file_name_for(prompt: &str) -> String {
    let head: String = prompt.chars().take(30).collect();
    let stem: String = head
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let stem = if stem.is_empty() { "image" } else { stem.as_str() };
    format!("{}_{}.png", stem, &suffix[..8])
}

#[async_trait]
impl CompletionClient for ImageToStorage {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let source_url = self.generator.generate(prompt).await?;
        let file_name = file_name_for(prompt);
        let stored = self.store.store_from_url(&source_url, &file_name).await?;
        tracing::debug!(file = %file_name, url = %stored, "stored generated image");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedImage;

    #[async_trait]
    impl ImageGenerator for FixedImage {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            if prompt.contains("fail") {
                return Err(ProviderError::EmptyResponse("no image".into()));
            }
            Ok("https://tmp.example/abc.png".into())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl FileStore for RecordingStore {
        async fn store_from_url(
            &self,
            source_url: &str,
            file_name: &str,
        ) -> Result<String, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((source_url.to_string(), file_name.to_string()));
            Ok("https://drive.google.com/uc?id=file-1".into())
        }
    }

    #[test]
    fn file_names_are_prompt_prefixed() {
        let name = file_name_for("Four women in their 20s gathered around a kitchen island");
        assert!(name.starts_with("Four_women_in_their_20s_gather_"), "{name}");
        assert!(name.ends_with(".png"));
        assert_eq!(file_name_for("   ").len(), "image_".len() + 8 + ".png".len());
    }

    #[tokio::test]
    async fn generates_then_stores() {
        let store = Arc::new(RecordingStore::default());
        let pipeline = ImageToStorage::new(Arc::new(FixedImage), store.clone());

        let url = pipeline
            .complete("A lunchbox", &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(url, "https://drive.google.com/uc?id=file-1");
        let seen = store.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "https://tmp.example/abc.png");

        drop(seen);
        let err = pipeline
            .complete("please fail", &CompletionOptions::default())
            .await;
        assert!(err.is_err());
        assert_eq!(store.seen.lock().unwrap().len(), 1);
    }
}
