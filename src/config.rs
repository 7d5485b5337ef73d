//! Service configuration: environment settings plus job definitions.
//!
//! Jobs are declared as JSON (`JOBS_FILE` path or inline `JOBS_JSON`), either
//! as a bare array or as `{ "jobs": [...] }`. Every job is validated and
//! compiled into a [`Job`] before the server starts.

use std::collections::HashSet;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::batch::job::{InputColumn, Job, OutputColumn};
use crate::batch::parser::ResponseParser;
use crate::batch::prompt::PromptTemplate;
use crate::providers::CompletionOptions;
use crate::sheet::a1::{column_index, CellRef};
use crate::util::env::{env_opt, env_parse, preflight_check};

pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const DEFAULT_START_ROW: u32 = 2;
pub const DEFAULT_DELAY_MS: u64 = 1000;
pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    #[default]
    Completion,
    Image,
}

/// What to do with rows whose group key cell is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UngroupedPolicy {
    /// One call per row, never deduplicated.
    #[default]
    Individual,
    /// Leave the row's outputs empty.
    Skip,
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

fn default_limit() -> usize {
    DEFAULT_CONCURRENCY
}

/// How the unique-key calls of one batch are scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CallStrategy {
    /// One call at a time with a fixed pause between calls.
    Sequential {
        #[serde(default = "default_delay_ms")]
        delay_ms: u64,
    },
    /// Fan out with at most `limit` calls in flight.
    Concurrent {
        #[serde(default = "default_limit")]
        limit: usize,
    },
}

impl Default for CallStrategy {
    fn default() -> Self {
        CallStrategy::Sequential {
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// The labeled line's value.
    #[default]
    Text,
    /// First standalone character from `allowed` within the labeled value.
    Grade,
    /// Separator-delimited list, normalized to `a, b, c`.
    List,
    /// The whole response, label ignored.
    Whole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Label the model is asked to emit; defaults to `name`.
    #[serde(default)]
    pub label: Option<String>,
    /// Output column letters.
    pub column: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub allowed: Option<String>,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub fallback: String,
}

impl FieldSpec {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub sheet: String,
    pub cursor_cell: String,
    #[serde(default)]
    pub start_row: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub kind: JobKind,
    /// Input field name -> column letters, in prompt order.
    pub columns: IndexMap<String, String>,
    #[serde(default)]
    pub group_key: Option<String>,
    #[serde(default)]
    pub ungrouped: UngroupedPolicy,
    pub prompt: String,
    #[serde(default)]
    pub options: CompletionOptions,
    pub fields: Vec<FieldSpec>,
    /// Written to every output field when the provider call fails.
    #[serde(default)]
    pub error_marker: Option<String>,
    #[serde(default)]
    pub strategy: CallStrategy,
}

/// Values a job inherits when it does not set its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDefaults {
    pub batch_size: u32,
    pub start_row: u32,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            start_row: DEFAULT_START_ROW,
        }
    }
}

fn valid_job_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn parse_column(job: &str, what: &str, letters: &str) -> Result<u32> {
    column_index(letters)
        .ok_or_else(|| anyhow!("job {job}: {what} has invalid column {letters:?}"))
}

impl JobSpec {
    /// Validate the definition and resolve it into a runnable [`Job`].
    pub fn compile(&self, defaults: &JobDefaults) -> Result<Job> {
        let name = self.name.trim();
        if !valid_job_name(name) {
            bail!("job name {:?} must match [a-z0-9_-]+", self.name);
        }
        if self.sheet.trim().is_empty() {
            bail!("job {name}: sheet is empty");
        }
        let cursor_cell: CellRef = self
            .cursor_cell
            .parse()
            .with_context(|| format!("job {name}: cursor_cell"))?;

        let start_row = self.start_row.unwrap_or(defaults.start_row);
        if start_row == 0 {
            bail!("job {name}: start_row must be >= 1");
        }
        let batch_size = self.batch_size.unwrap_or(defaults.batch_size);
        if batch_size == 0 {
            bail!("job {name}: batch_size must be >= 1");
        }

        if self.columns.is_empty() {
            bail!("job {name}: at least one input column is required");
        }
        let mut inputs = Vec::with_capacity(self.columns.len());
        for (field, letters) in &self.columns {
            inputs.push(InputColumn {
                name: field.clone(),
                col: parse_column(name, &format!("input {field}"), letters)?,
            });
        }

        if let Some(key) = &self.group_key {
            if !self.columns.contains_key(key) {
                bail!("job {name}: group_key {key:?} is not an input column");
            }
        }

        if self.fields.is_empty() {
            bail!("job {name}: at least one output field is required");
        }
        let mut outputs = Vec::with_capacity(self.fields.len());
        let mut seen_cols = HashSet::new();
        let mut seen_names = HashSet::new();
        for field in &self.fields {
            if !seen_names.insert(field.name.as_str()) {
                bail!("job {name}: duplicate output field {:?}", field.name);
            }
            let col = parse_column(name, &format!("field {}", field.name), &field.column)?;
            if !seen_cols.insert(col) {
                bail!("job {name}: output column {} used twice", field.column);
            }
            if inputs.iter().any(|input| input.col == col) {
                bail!(
                    "job {name}: output column {} would overwrite an input column",
                    field.column
                );
            }
            if col == cursor_cell.col && cursor_cell.row >= start_row {
                bail!(
                    "job {name}: cursor cell {} sits inside output column {}",
                    self.cursor_cell,
                    field.column
                );
            }
            outputs.push(OutputColumn {
                name: field.name.clone(),
                col,
            });
        }

        let prompt = PromptTemplate::new(&self.prompt);
        let unknown: Vec<&str> = prompt
            .placeholders()
            .filter(|p| !self.columns.contains_key(*p))
            .collect();
        if !unknown.is_empty() {
            bail!("job {name}: prompt references unknown columns {unknown:?}");
        }

        if let CallStrategy::Concurrent { limit: 0 } = self.strategy {
            bail!("job {name}: concurrent limit must be >= 1");
        }

        let parser =
            ResponseParser::new(&self.fields).with_context(|| format!("job {name}: fields"))?;

        Ok(Job {
            name: name.to_string(),
            sheet: self.sheet.clone(),
            cursor_cell,
            start_row,
            batch_size,
            kind: self.kind,
            inputs,
            group_key: self.group_key.clone(),
            ungrouped: self.ungrouped,
            prompt,
            options: self.options.clone(),
            outputs,
            parser,
            error_marker: self.error_marker.clone(),
            strategy: self.strategy.clone(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobsDocument {
    List(Vec<JobSpec>),
    Wrapped { jobs: Vec<JobSpec> },
}

/// Parse a jobs document and reject duplicate names.
pub fn parse_jobs(raw: &str) -> Result<Vec<JobSpec>> {
    let doc: JobsDocument = serde_json::from_str(raw).context("invalid jobs JSON")?;
    let jobs = match doc {
        JobsDocument::List(jobs) | JobsDocument::Wrapped { jobs } => jobs,
    };
    if jobs.is_empty() {
        bail!("no jobs defined");
    }
    let mut names = HashSet::new();
    for job in &jobs {
        if !names.insert(job.name.trim()) {
            bail!("duplicate job name {:?}", job.name);
        }
    }
    Ok(jobs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetBackend {
    Google,
    Memory,
}

/// Process-level configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: SheetBackend,
    pub spreadsheet_id: Option<String>,
    pub credentials_json: Option<String>,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub drive_folder_id: Option<String>,
    pub provider_timeout_secs: u64,
    pub defaults: JobDefaults,
    pub jobs: Vec<JobSpec>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let backend = match env_opt("SHEET_BACKEND")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("google") => SheetBackend::Google,
            Some("memory") => SheetBackend::Memory,
            Some(other) => bail!("unknown SHEET_BACKEND {other:?} (expected google|memory)"),
        };

        let mut required = vec!["OPENAI_API_KEY"];
        if backend == SheetBackend::Google {
            required.extend(["SPREADSHEET_ID", "GOOGLE_CREDENTIALS_JSON"]);
        }
        preflight_check(
            "sheet-enricher",
            &required,
            &[
                "SHEET_BACKEND",
                "SPREADSHEET_ID",
                "GOOGLE_CREDENTIALS_JSON",
                "OPENAI_API_KEY",
                "OPENAI_BASE_URL",
                "GDRIVE_FOLDER_ID",
                "BATCH_SIZE",
                "START_ROW",
                "JOBS_FILE",
            ],
        )?;

        let raw_jobs = match (env_opt("JOBS_FILE"), env_opt("JOBS_JSON")) {
            (Some(path), _) => std::fs::read_to_string(path.trim())
                .with_context(|| format!("reading JOBS_FILE {path}"))?,
            (None, Some(inline)) => inline,
            (None, None) => bail!("set JOBS_FILE or JOBS_JSON to define at least one job"),
        };

        Ok(Self {
            backend,
            spreadsheet_id: env_opt("SPREADSHEET_ID"),
            credentials_json: env_opt("GOOGLE_CREDENTIALS_JSON"),
            openai_api_key: env_opt("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env_opt("OPENAI_BASE_URL"),
            drive_folder_id: env_opt("GDRIVE_FOLDER_ID"),
            provider_timeout_secs: env_parse("PROVIDER_TIMEOUT_SECS", 60u64),
            defaults: JobDefaults {
                batch_size: env_parse("BATCH_SIZE", DEFAULT_BATCH_SIZE),
                start_row: env_parse("START_ROW", DEFAULT_START_ROW),
            },
            jobs: parse_jobs(&raw_jobs)?,
        })
    }

    /// Compile every job definition, failing on the first invalid one.
    pub fn compile_jobs(&self) -> Result<Vec<Job>> {
        self.jobs.iter().map(|j| j.compile(&self.defaults)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORES: &str = r#"[{
        "name": "product-scores",
        "sheet": "Products",
        "cursor_cell": "Z1",
        "columns": { "handle": "A", "title": "B", "description": "C" },
        "group_key": "handle",
        "prompt": "Grade {title}: {description}",
        "fields": [
            { "name": "score", "label": "Score", "column": "E", "kind": "grade", "allowed": "ABCDE" },
            { "name": "note", "label": "Note", "column": "F" }
        ],
        "strategy": { "mode": "concurrent", "limit": 3 }
    }]"#;

    #[test]
    fn parses_and_compiles_with_defaults() {
        let jobs = parse_jobs(SCORES).unwrap();
        let job = jobs[0].compile(&JobDefaults::default()).unwrap();
        assert_eq!(job.name, "product-scores");
        assert_eq!(job.start_row, 2);
        assert_eq!(job.batch_size, 100);
        assert_eq!(job.cursor_cell, CellRef::new(26, 1));
        assert_eq!(job.input_span(), (1, 3));
        assert_eq!(job.strategy, CallStrategy::Concurrent { limit: 3 });
        assert_eq!(job.ungrouped, UngroupedPolicy::Individual);
        assert_eq!(job.kind, JobKind::Completion);
        assert_eq!(job.options, CompletionOptions::default());
    }

    #[test]
    fn accepts_wrapped_document_and_strategy_defaults() {
        let raw = format!(r#"{{ "jobs": {} }}"#, SCORES.replace(r#""limit": 3"#, r#""x": 0"#));
        let jobs = parse_jobs(&raw).unwrap();
        assert_eq!(jobs[0].strategy, CallStrategy::Concurrent { limit: DEFAULT_CONCURRENCY });

        let mut spec = jobs[0].clone();
        spec.strategy = CallStrategy::default();
        assert_eq!(spec.strategy, CallStrategy::Sequential { delay_ms: 1000 });
    }

    #[test]
    fn rejects_invalid_definitions() {
        let base = parse_jobs(SCORES).unwrap().remove(0);
        let defaults = JobDefaults::default();

        let mut bad = base.clone();
        bad.prompt = "Grade {title} for {brand}".into();
        let err = bad.compile(&defaults).unwrap_err().to_string();
        assert!(err.contains("brand"), "{err}");

        let mut bad = base.clone();
        bad.group_key = Some("sku".into());
        assert!(bad.compile(&defaults).is_err());

        let mut bad = base.clone();
        bad.fields[1].column = "E".into();
        assert!(bad.compile(&defaults).is_err());

        let mut bad = base.clone();
        bad.fields[0].column = "c".into();
        let err = bad.compile(&defaults).unwrap_err();
        assert!(err.to_string().contains("overwrite an input column"));

        let mut bad = base.clone();
        bad.name = "Product Scores".into();
        assert!(bad.compile(&defaults).is_err());

        let mut bad = base.clone();
        bad.cursor_cell = "E5".into();
        assert!(bad.compile(&defaults).is_err());

        let mut bad = base.clone();
        bad.batch_size = Some(0);
        assert!(bad.compile(&defaults).is_err());

        let mut bad = base;
        bad.strategy = CallStrategy::Concurrent { limit: 0 };
        assert!(bad.compile(&defaults).is_err());
    }

    #[test]
    fn rejects_duplicate_job_names() {
        let one = SCORES.trim().trim_start_matches('[').trim_end_matches(']');
        let raw = format!("[{one},{one}]");
        assert!(parse_jobs(&raw).is_err());
        assert!(parse_jobs("[]").is_err());
    }

    #[test]
    fn sample_jobs_file_compiles() {
        let jobs = parse_jobs(include_str!("../jobs.sample.json")).unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["product-scores", "tags", "images"]);
        for spec in &jobs {
            spec.compile(&JobDefaults::default()).unwrap();
        }
        assert_eq!(jobs[2].kind, JobKind::Image);
    }
}
