use std::sync::Arc;

use tracing::warn;

use crate::error::TransportError;
use crate::sheet::{CellRef, SheetClient};

/// Persists "next row to process" in a sentinel cell.
///
/// There is no locking: two concurrent runs of the same job read the same
/// cursor and process the same window. Callers assume a single writer.
#[derive(Clone)]
pub struct CursorStore {
    sheet: Arc<dyn SheetClient>,
    tab: String,
    cell: CellRef,
    base: u32,
}

/// Interpret a sentinel cell. `None` means "use the base row".
pub fn parse_cursor(raw: &str) -> Option<u32> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    let value = match cleaned.parse::<u32>() {
        Ok(v) => v,
        Err(_) => {
            let f: f64 = cleaned.parse().ok()?;
            if f.fract() != 0.0 || f < 0.0 || f > u32::MAX as f64 {
                return None;
            }
            f as u32
        }
    };
    (value >= 1).then_some(value)
}

impl CursorStore {
    pub fn new(sheet: Arc<dyn SheetClient>, tab: impl Into<String>, cell: CellRef, base: u32) -> Self {
        Self {
            sheet,
            tab: tab.into(),
            cell,
            base,
        }
    }

    pub async fn get(&self) -> Result<u32, TransportError> {
        let raw = self.sheet.read_cell(&self.tab, self.cell).await?;
        let raw = raw.unwrap_or_default();
        match parse_cursor(&raw) {
            Some(row) => Ok(row),
            None => {
                if !raw.trim().is_empty() {
                    warn!(
                        sheet = %self.tab,
                        cell = %self.cell,
                        value = %raw,
                        base = self.base,
                        "cursor cell is not a row number; starting from base"
                    );
                }
                Ok(self.base)
            }
        }
    }

    pub async fn set(&self, row: u32) -> Result<(), TransportError> {
        self.sheet
            .write_cell(&self.tab, self.cell, row.to_string())
            .await
    }

    pub async fn reset(&self) -> Result<u32, TransportError> {
        self.set(self.base).await?;
        Ok(self.base)
    }
}
