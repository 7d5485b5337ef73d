//! In-process sheet used by tests and `SHEET_BACKEND=memory` dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CellRef, SheetClient, SheetRange};
use crate::error::TransportError;

type CellKey = (String, u32, u32);

#[derive(Debug, Default)]
pub struct MemorySheet {
    cells: Mutex<BTreeMap<CellKey, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_calls: AtomicUsize,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows on `sheet` starting at `first_row`, column A onwards.
    pub fn with_rows(self, sheet: &str, first_row: u32, rows: &[&[&str]]) -> Self {
        {
            let mut cells = self.lock();
            for (i, row) in rows.iter().enumerate() {
                for (j, value) in row.iter().enumerate() {
                    if !value.is_empty() {
                        cells.insert(
                            (sheet.to_string(), first_row + i as u32, j as u32 + 1),
                            value.to_string(),
                        );
                    }
                }
            }
        }
        self
    }

    pub fn get(&self, sheet: &str, cell: &str) -> Option<String> {
        let cell: CellRef = cell.parse().ok()?;
        self.lock()
            .get(&(sheet.to_string(), cell.row, cell.col))
            .cloned()
    }

    pub fn set(&self, sheet: &str, cell: &str, value: &str) {
        if let Ok(cell) = cell.parse::<CellRef>() {
            self.lock()
                .insert((sheet.to_string(), cell.row, cell.col), value.to_string());
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write round-trips (a batch write counts once).
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<CellKey, String>> {
        // A poisoned map only means a test panicked mid-write; the data is still usable.
        self.cells.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn apply(&self, range: &SheetRange, rows: Vec<Vec<String>>) {
        let mut cells = self.lock();
        for (i, row) in rows.into_iter().enumerate().take(range.height()) {
            for (j, value) in row.into_iter().enumerate().take(range.width()) {
                let key = (
                    range.sheet.clone(),
                    range.start.row + i as u32,
                    range.start.col + j as u32,
                );
                if value.is_empty() {
                    cells.remove(&key);
                } else {
                    cells.insert(key, value);
                }
            }
        }
    }
}

#[async_trait]
impl SheetClient for MemorySheet {
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<String>>, TransportError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("reads disabled".into()));
        }
        let cells = self.lock();
        let mut out: Vec<Vec<String>> = (range.start.row..=range.end.row)
            .map(|row| {
                let mut values: Vec<String> = (range.start.col..=range.end.col)
                    .map(|col| {
                        cells
                            .get(&(range.sheet.clone(), row, col))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                while values.last().is_some_and(|v| v.is_empty()) {
                    values.pop();
                }
                values
            })
            .collect();
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn write_range(
        &self,
        range: &SheetRange,
        rows: Vec<Vec<String>>,
    ) -> Result<(), TransportError> {
        self.check_writable()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.apply(range, rows);
        Ok(())
    }

    async fn write_ranges(
        &self,
        batch: Vec<(SheetRange, Vec<Vec<String>>)>,
    ) -> Result<(), TransportError> {
        self.check_writable()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        for (range, rows) in batch {
            self.apply(&range, rows);
        }
        Ok(())
    }
}
