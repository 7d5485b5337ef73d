//! One batch run per trigger: read the cursor, process the window, write the
//! results, advance the cursor.
//!
//! Failure semantics:
//! - any `TransportError` aborts the run before the cursor moves, so the next
//!   trigger retries the same window;
//! - a crash after the write but before the cursor update re-processes the
//!   window, overwriting the same cells (at-least-once).

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::cursor::CursorStore;
use super::job::Job;
use super::processor::{BatchProcessor, BatchStats};
use super::writer::write_results;
use crate::error::TransportError;
use crate::providers::CompletionClient;
use crate::sheet::{SheetClient, SheetRange, MAX_ROWS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub job: String,
    pub first_row: u32,
    pub last_row: u32,
    pub rows: usize,
    pub next_cursor: u32,
    pub stats: BatchStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Processed(RunSummary),
    /// The window at the cursor held no rows; nothing was written.
    AllProcessed { cursor: u32 },
}

pub struct JobRunner {
    job: Job,
    sheet: Arc<dyn SheetClient>,
    client: Arc<dyn CompletionClient>,
    cursor: CursorStore,
}

impl JobRunner {
    pub fn new(job: Job, sheet: Arc<dyn SheetClient>, client: Arc<dyn CompletionClient>) -> Self {
        let cursor = CursorStore::new(sheet.clone(), job.sheet.clone(), job.cursor_cell, job.start_row);
        Self {
            job,
            sheet,
            client,
            cursor,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub async fn cursor(&self) -> Result<u32, TransportError> {
        self.cursor.get().await
    }

    pub async fn reset(&self) -> Result<u32, TransportError> {
        let base = self.cursor.reset().await?;
        info!(job = %self.job.name, cursor = base, "cursor reset");
        Ok(base)
    }

    pub async fn run(&self) -> Result<RunOutcome, TransportError> {
        let job = &self.job;
        let start = self.cursor.get().await?;
        if start > MAX_ROWS {
            info!(job = %job.name, cursor = start, "cursor is past the last sheet row");
            return Ok(RunOutcome::AllProcessed { cursor: start });
        }
        let (first_col, last_col) = job.input_span();
        let window = SheetRange::rows(&job.sheet, first_col, last_col, start, job.batch_size);

        let raw = self.sheet.read_range(&window).await?;
        if raw.is_empty() {
            info!(job = %job.name, cursor = start, "no rows left to process");
            return Ok(RunOutcome::AllProcessed { cursor: start });
        }

        let rows: Vec<_> = raw
            .iter()
            .enumerate()
            .map(|(i, cells)| job.row_from_cells(start.saturating_add(i as u32), cells))
            .collect();

        let output = BatchProcessor::new(job, self.client.as_ref())
            .process(&rows)
            .await;

        write_results(self.sheet.as_ref(), job, start, &output.results).await?;

        let next = start.saturating_add(rows.len() as u32);
        self.cursor.set(next).await?;

        let summary = RunSummary {
            job: job.name.clone(),
            first_row: start,
            last_row: next - 1,
            rows: rows.len(),
            next_cursor: next,
            stats: output.stats,
        };
        info!(
            job = %job.name,
            first_row = summary.first_row,
            last_row = summary.last_row,
            api_calls = summary.stats.api_calls,
            dedup_hits = summary.stats.dedup_hits,
            provider_failures = summary.stats.provider_failures,
            parse_misses = summary.stats.parse_misses,
            "batch processed"
        );
        Ok(RunOutcome::Processed(summary))
    }
}
