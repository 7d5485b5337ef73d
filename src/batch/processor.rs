//! Dedup batch processor: one provider call per distinct group key, results
//! broadcast back to every row in the window, order preserved.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::job::Job;
use super::{Row, RowResult};
use crate::config::{CallStrategy, UngroupedPolicy};
use crate::providers::CompletionClient;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub rows: usize,
    pub api_calls: usize,
    /// Rows that reused another row's result through their group key.
    pub dedup_hits: usize,
    pub skipped: usize,
    pub provider_failures: usize,
    pub parse_misses: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput {
    /// Same length and order as the input rows.
    pub results: Vec<RowResult>,
    pub stats: BatchStats,
}

enum Slot {
    Blank,
    Call(usize),
}

struct CallOutcome {
    result: RowResult,
    provider_failed: bool,
    parse_missing: bool,
}

pub struct BatchProcessor<'a> {
    job: &'a Job,
    client: &'a dyn CompletionClient,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(job: &'a Job, client: &'a dyn CompletionClient) -> Self {
        Self { job, client }
    }

    pub async fn process(&self, rows: &[Row]) -> BatchOutput {
        let mut stats = BatchStats {
            rows: rows.len(),
            ..BatchStats::default()
        };
        let mut slots = Vec::with_capacity(rows.len());
        let mut representatives: Vec<&Row> = Vec::new();
        let mut by_key: HashMap<&str, usize> = HashMap::new();

        for row in rows {
            if row.is_blank() {
                stats.skipped += 1;
                slots.push(Slot::Blank);
                continue;
            }
            match self.job.group_key_of(row) {
                Some(key) => match by_key.get(key) {
                    Some(&idx) => {
                        stats.dedup_hits += 1;
                        slots.push(Slot::Call(idx));
                    }
                    None => {
                        by_key.insert(key, representatives.len());
                        slots.push(Slot::Call(representatives.len()));
                        representatives.push(row);
                    }
                },
                None => match self.job.ungrouped {
                    UngroupedPolicy::Individual => {
                        slots.push(Slot::Call(representatives.len()));
                        representatives.push(row);
                    }
                    UngroupedPolicy::Skip => {
                        stats.skipped += 1;
                        slots.push(Slot::Blank);
                    }
                },
            }
        }

        let outcomes = self.run_calls(&representatives).await;
        stats.api_calls = outcomes.len();
        stats.provider_failures = outcomes.iter().filter(|o| o.provider_failed).count();
        stats.parse_misses = outcomes.iter().filter(|o| o.parse_missing).count();

        let blank = self.job.parser.blank();
        let results = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Blank => blank.clone(),
                Slot::Call(idx) => outcomes[idx].result.clone(),
            })
            .collect();

        BatchOutput { results, stats }
    }

    async fn run_calls(&self, rows: &[&Row]) -> Vec<CallOutcome> {
        match self.job.strategy {
            CallStrategy::Sequential { delay_ms } => {
                let mut out = Vec::with_capacity(rows.len());
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 && delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                    out.push(self.call_one(row).await);
                }
                out
            }
            // `buffered` yields in input order regardless of completion order.
            CallStrategy::Concurrent { limit } => {
                stream::iter(rows.iter().map(|row| self.call_one(row)))
                    .buffered(limit.max(1))
                    .collect()
                    .await
            }
        }
    }

    async fn call_one(&self, row: &Row) -> CallOutcome {
        let prompt = self.job.prompt.render(row);
        match self.client.complete(&prompt, &self.job.options).await {
            Ok(text) => {
                let parsed = self.job.parser.parse(&text);
                let parse_missing = !parsed.missing.is_empty();
                if parse_missing {
                    warn!(
                        job = %self.job.name,
                        row = row.number,
                        missing = ?parsed.missing,
                        "response missing expected fields; using fallbacks"
                    );
                } else {
                    debug!(job = %self.job.name, row = row.number, "parsed response");
                }
                CallOutcome {
                    result: parsed.result,
                    provider_failed: false,
                    parse_missing,
                }
            }
            Err(e) => {
                warn!(
                    job = %self.job.name,
                    row = row.number,
                    error = %e,
                    "provider call failed; substituting fallback"
                );
                CallOutcome {
                    result: self.job.parser.failed(self.job.error_marker.as_deref()),
                    provider_failed: true,
                    parse_missing: false,
                }
            }
        }
    }
}
