use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::TokenSource;
use crate::error::{truncate_for_log, TransportError};
use crate::sheet::{SheetClient, SheetRange};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Google Sheets v4 values API.
///
/// Key endpoints:
/// - GET  /v4/spreadsheets/{id}/values/{range}
/// - PUT  /v4/spreadsheets/{id}/values/{range}?valueInputOption=RAW
/// - POST /v4/spreadsheets/{id}/values:batchUpdate
pub struct GoogleSheets {
    base_url: String,
    spreadsheet_id: String,
    http: Client,
    tokens: Arc<TokenSource>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheets {
    pub fn new(spreadsheet_id: impl Into<String>, http: Client, tokens: Arc<TokenSource>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            http,
            tokens,
        }
    }

    async fn checked(resp: Response) -> Result<Response, TransportError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn values_url(base: &str, spreadsheet_id: &str, range: &SheetRange) -> String {
    format!(
        "{}/v4/spreadsheets/{}/values/{}",
        base,
        spreadsheet_id,
        urlencoding::encode(&range.to_string())
    )
}

fn cell_to_string(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetClient for GoogleSheets {
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<String>>, TransportError> {
        let token = self.tokens.access_token().await?;
        let url = values_url(&self.base_url, &self.spreadsheet_id, range);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await?;
        let body: ValueRange = Self::checked(resp)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Decode(format!("{range}: {e}")))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn write_range(
        &self,
        range: &SheetRange,
        rows: Vec<Vec<String>>,
    ) -> Result<(), TransportError> {
        let token = self.tokens.access_token().await?;
        let url = values_url(&self.base_url, &self.spreadsheet_id, range);
        let payload = json!({
            "range": range.to_string(),
            "majorDimension": "ROWS",
            "values": rows,
        });
        let resp = self
            .http
            .put(&url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&payload)
            .send()
            .await?;
        Self::checked(resp).await?;
        Ok(())
    }

    async fn write_ranges(
        &self,
        batch: Vec<(SheetRange, Vec<Vec<String>>)>,
    ) -> Result<(), TransportError> {
        if batch.is_empty() {
            return Ok(());
        }
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let data: Vec<Value> = batch
            .into_iter()
            .map(|(range, values)| {
                json!({
                    "range": range.to_string(),
                    "majorDimension": "ROWS",
                    "values": values,
                })
            })
            .collect();
        let payload = json!({ "valueInputOption": "RAW", "data": data });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        Self::checked(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellRef;

    #[test]
    fn encodes_range_in_url() {
        let range = SheetRange::new("My Tab", CellRef::new(1, 2), CellRef::new(4, 101));
        let url = values_url(DEFAULT_BASE_URL, "abc123", &range);
        assert_eq!(
            url,
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/%27My%20Tab%27%21A2%3AD101"
        );
    }

    #[test]
    fn stringifies_non_text_cells() {
        let parsed: ValueRange =
            serde_json::from_str(r#"{"range":"S!A1:C1","values":[["x", 12, true, null]]}"#)
                .unwrap();
        let row: Vec<String> = parsed.values[0].iter().cloned().map(cell_to_string).collect();
        assert_eq!(row, vec!["x", "12", "true", ""]);

        let empty: ValueRange = serde_json::from_str(r#"{"range":"S!A1:C1"}"#).unwrap();
        assert!(empty.values.is_empty());
    }
}
