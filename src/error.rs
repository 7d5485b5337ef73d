//! Error taxonomy shared by the storage and provider adapters.
//!
//! `TransportError` is fatal to a batch run (the cursor stays put), while
//! `ProviderError` only ever costs a single item its result.

use thiserror::Error;

/// Sheet or storage backend failure (network, auth, unexpected payload).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("sheet request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sheet api returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected sheet response: {0}")]
    Decode(String),

    /// Raised by in-process backends (tests, dry runs).
    #[error("sheet backend unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single external generation call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider rate limited: {body}")]
    RateLimited { body: String },

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned no content: {0}")]
    EmptyResponse(String),

    #[error("file storage failed: {0}")]
    Storage(String),
}

impl ProviderError {
    /// Map a non-success HTTP response into the matching variant.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ProviderError::RateLimited { body }
        } else {
            ProviderError::Status {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Trim a response body before it lands in an error or a log line.
pub(crate) fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_requests_maps_to_rate_limited() {
        let err = ProviderError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow".into());
        assert!(matches!(err, ProviderError::RateLimited { .. }));

        let err = ProviderError::from_status(reqwest::StatusCode::BAD_GATEWAY, "oops".into());
        assert!(matches!(err, ProviderError::Status { status: 502, .. }));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let out = truncate_for_log("ééééé".to_string(), 3);
        assert_eq!(out, "é…");
        assert_eq!(truncate_for_log("short".to_string(), 10), "short");
    }
}
