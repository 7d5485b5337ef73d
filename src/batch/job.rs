use indexmap::IndexMap;

use super::parser::ResponseParser;
use super::prompt::PromptTemplate;
use super::Row;
use crate::config::{CallStrategy, JobKind, UngroupedPolicy};
use crate::providers::CompletionOptions;
use crate::sheet::CellRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputColumn {
    pub name: String,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub col: u32,
}

/// A validated job definition, ready to run. Built by `JobSpec::compile`.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub sheet: String,
    pub cursor_cell: CellRef,
    pub start_row: u32,
    pub batch_size: u32,
    pub kind: JobKind,
    pub inputs: Vec<InputColumn>,
    pub group_key: Option<String>,
    pub ungrouped: UngroupedPolicy,
    pub prompt: PromptTemplate,
    pub options: CompletionOptions,
    pub outputs: Vec<OutputColumn>,
    pub parser: ResponseParser,
    pub error_marker: Option<String>,
    pub strategy: CallStrategy,
}

impl Job {
    /// First and last column covered by the inputs.
    pub fn input_span(&self) -> (u32, u32) {
        let first = self.inputs.iter().map(|c| c.col).min().unwrap_or(1);
        let last = self.inputs.iter().map(|c| c.col).max().unwrap_or(first);
        (first, last)
    }

    /// Map one raw sheet row (starting at the span's first column) onto named inputs.
    pub fn row_from_cells(&self, number: u32, cells: &[String]) -> Row {
        let (first, _) = self.input_span();
        let values: IndexMap<String, String> = self
            .inputs
            .iter()
            .map(|c| {
                let value = cells
                    .get((c.col - first) as usize)
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default();
                (c.name.clone(), value)
            })
            .collect();
        Row::new(number, values)
    }

    /// Non-empty group key for `row`, if the job groups at all.
    pub fn group_key_of<'r>(&self, row: &'r Row) -> Option<&'r str> {
        let key = self.group_key.as_deref()?;
        Some(row.get(key)).filter(|v| !v.is_empty())
    }
}
