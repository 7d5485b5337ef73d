use super::job::{Job, OutputColumn};
use super::RowResult;
use crate::error::TransportError;
use crate::sheet::{SheetClient, SheetRange};

/// Group output columns into runs of adjacent columns, ordered left to right.
fn adjacent_runs(outputs: &[OutputColumn]) -> Vec<Vec<&OutputColumn>> {
    let mut sorted: Vec<&OutputColumn> = outputs.iter().collect();
    sorted.sort_by_key(|c| c.col);

    let mut runs: Vec<Vec<&OutputColumn>> = Vec::new();
    for col in sorted {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|prev| prev.col + 1 == col.col) => run.push(col),
            _ => runs.push(vec![col]),
        }
    }
    runs
}

/// Ranges and values for writing `results` back starting at `start_row`.
///
/// `results[i]` always lands on row `start_row + i`.
pub fn plan_writes(
    job: &Job,
    start_row: u32,
    results: &[RowResult],
) -> Vec<(SheetRange, Vec<Vec<String>>)> {
    if results.is_empty() {
        return Vec::new();
    }
    adjacent_runs(&job.outputs)
        .into_iter()
        .map(|run| {
            let first = run[0].col;
            let last = run[run.len() - 1].col;
            let range = SheetRange::rows(&job.sheet, first, last, start_row, results.len() as u32);
            let values = results
                .iter()
                .map(|r| {
                    run.iter()
                        .map(|c| r.get(&c.name).unwrap_or_default().to_string())
                        .collect()
                })
                .collect();
            (range, values)
        })
        .collect()
}

/// Write one batch of results in a single round-trip.
pub async fn write_results(
    sheet: &dyn SheetClient,
    job: &Job,
    start_row: u32,
    results: &[RowResult],
) -> Result<(), TransportError> {
    let batch = plan_writes(job, start_row, results);
    if batch.is_empty() {
        return Ok(());
    }
    sheet.write_ranges(batch).await
}
