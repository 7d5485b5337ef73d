// Spreadsheet storage seam: the batch core only talks to `SheetClient`.

pub mod a1;
pub mod memory;

use async_trait::async_trait;

use crate::error::TransportError;

pub use a1::{CellRef, SheetRange, MAX_ROWS};
pub use memory::MemorySheet;

/// Read/write access to a spreadsheet's values.
///
/// Reads follow Google Sheets semantics: trailing empty rows are dropped and
/// rows can be shorter than the requested width.
#[async_trait]
pub trait SheetClient: Send + Sync {
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<String>>, TransportError>;

    async fn write_range(
        &self,
        range: &SheetRange,
        rows: Vec<Vec<String>>,
    ) -> Result<(), TransportError>;

    /// Write several ranges; backends with a batch endpoint override this.
    async fn write_ranges(
        &self,
        batch: Vec<(SheetRange, Vec<Vec<String>>)>,
    ) -> Result<(), TransportError> {
        for (range, rows) in batch {
            self.write_range(&range, rows).await?;
        }
        Ok(())
    }

    async fn read_cell(&self, sheet: &str, cell: CellRef) -> Result<Option<String>, TransportError> {
        let rows = self.read_range(&SheetRange::cell(sheet, cell)).await?;
        Ok(rows.into_iter().next().and_then(|r| r.into_iter().next()))
    }

    async fn write_cell(
        &self,
        sheet: &str,
        cell: CellRef,
        value: String,
    ) -> Result<(), TransportError> {
        self.write_range(&SheetRange::cell(sheet, cell), vec![vec![value]])
            .await
    }
}
