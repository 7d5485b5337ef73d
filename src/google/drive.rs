use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::auth::TokenSource;
use crate::error::{truncate_for_log, ProviderError};
use crate::providers::FileStore;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const BOUNDARY: &str = "sheet_enricher_upload_boundary";

/// Drive v3 uploads with public read access.
pub struct DriveStore {
    api_base: String,
    folder_id: Option<String>,
    http: Client,
    tokens: Arc<TokenSource>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

pub fn public_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?id={file_id}")
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
fn multipart_body(metadata: &serde_json::Value, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl DriveStore {
    pub fn new(folder_id: Option<String>, http: Client, tokens: Arc<TokenSource>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            folder_id: folder_id.filter(|s| !s.trim().is_empty()),
            http,
            tokens,
        }
    }

    async fn fail_on_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, ProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = truncate_for_log(resp.text().await.unwrap_or_default(), 1000);
        Err(ProviderError::Storage(format!("{what} returned {status}: {body}")))
    }

    async fn download(&self, source_url: &str) -> Result<Vec<u8>, ProviderError> {
        let resp = self.http.get(source_url).send().await?;
        let resp = Self::fail_on_status(resp, "image download").await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl FileStore for DriveStore {
    async fn store_from_url(
        &self,
        source_url: &str,
        file_name: &str,
    ) -> Result<String, ProviderError> {
        let bytes = self.download(source_url).await?;
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| ProviderError::Storage(e.to_string()))?;

        let mut metadata = json!({ "name": file_name, "mimeType": "image/png" });
        if let Some(folder) = &self.folder_id {
            metadata["parents"] = json!([folder]);
        }

        let upload_url = format!(
            "{}/upload/drive/v3/files?uploadType=multipart&fields=id&supportsAllDrives=true",
            self.api_base
        );
        let resp = self
            .http
            .post(&upload_url)
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={BOUNDARY}"),
            )
            .body(multipart_body(&metadata, "image/png", &bytes))
            .send()
            .await?;
        let created: CreatedFile = Self::fail_on_status(resp, "drive upload").await?.json().await?;

        let perm_url = format!(
            "{}/drive/v3/files/{}/permissions?supportsAllDrives=true",
            self.api_base, created.id
        );
        let resp = self
            .http
            .post(&perm_url)
            .bearer_auth(&token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;
        Self::fail_on_status(resp, "drive permission").await?;

        tracing::info!(file_id = %created.id, name = %file_name, "uploaded image to drive");
        Ok(public_url(&created.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_layout() {
        let body = multipart_body(&json!({ "name": "a.png" }), "image/png", b"PNG");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{BOUNDARY}\r\nContent-Type: application/json")));
        assert!(text.contains("{\"name\":\"a.png\"}\r\n"));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNG\r\n"));
        assert!(text.ends_with(&format!("--{BOUNDARY}--\r\n")));
    }

    #[test]
    fn public_links_use_uc_endpoint() {
        assert_eq!(public_url("xyz"), "https://drive.google.com/uc?id=xyz");
    }
}
