//! The batch-cursor row-processing loop.
//!
//! `runner` ties it together: cursor -> window read -> `processor` (dedup +
//! provider calls + `parser`) -> `writer` -> cursor advance.

pub mod cursor;
pub mod job;
pub mod parser;
pub mod processor;
pub mod prompt;
pub mod runner;
pub mod writer;

use indexmap::IndexMap;
use serde::Serialize;

/// One sheet row's named input cells (trimmed), identified by its row number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub number: u32,
    cells: IndexMap<String, String>,
}

impl Row {
    pub fn new(number: u32, cells: IndexMap<String, String>) -> Self {
        Self { number, cells }
    }

    /// Cell value for `name`; empty when the column is unknown or blank.
    pub fn get(&self, name: &str) -> &str {
        self.cells.get(name).map(String::as_str).unwrap_or("")
    }

    /// True when every tracked input cell is empty.
    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.is_empty())
    }
}

/// Output fields produced for one row, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowResult {
    pub fields: IndexMap<String, String>,
}

impl RowResult {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|v| v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RowResult {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
