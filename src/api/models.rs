// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::processor::BatchStats;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub jobs: Vec<String>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processed,
    AllProcessed,
}

/// Result of one `/generate-{job}-batch` trigger.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub message: String,
    pub status: BatchStatus,
    pub job: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_row: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_row: Option<u32>,
    pub rows: usize,
    pub next_cursor: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BatchStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub job: String,
    pub cursor: u32,
}

#[derive(Debug, Deserialize)]
pub struct ImageTestQuery {
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageTestResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}
