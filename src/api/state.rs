// Shared application state: one runner per configured job plus optional image backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::info;

use crate::batch::runner::JobRunner;
use crate::config::{AppConfig, JobKind, SheetBackend};
use crate::google::{DriveStore, GoogleSheets, ServiceAccount, TokenSource, DRIVE_SCOPE, SHEETS_SCOPE};
use crate::providers::{CompletionClient, ImageGenerator, ImageToStorage, OpenAiChat, OpenAiImages};
use crate::sheet::{MemorySheet, SheetClient};

pub struct AppState {
    runners: IndexMap<String, Arc<JobRunner>>,
    images: Option<Arc<dyn ImageGenerator>>,
    started_at: Instant,
}

impl AppState {
    pub fn new(runners: Vec<JobRunner>, images: Option<Arc<dyn ImageGenerator>>) -> Self {
        let runners = runners
            .into_iter()
            .map(|r| (r.job().name.clone(), Arc::new(r)))
            .collect();
        Self {
            runners,
            images,
            started_at: Instant::now(),
        }
    }

    pub fn runner(&self, name: &str) -> Option<Arc<JobRunner>> {
        self.runners.get(name).cloned()
    }

    pub fn job_names(&self) -> Vec<String> {
        self.runners.keys().cloned().collect()
    }

    pub fn images(&self) -> Option<Arc<dyn ImageGenerator>> {
        self.images.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Wire the configured backends and compile every job.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let jobs = config.compile_jobs()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()
            .context("building http client")?;

        let account = config
            .credentials_json
            .as_deref()
            .map(ServiceAccount::from_json)
            .transpose()?;

        let sheet: Arc<dyn SheetClient> = match config.backend {
            SheetBackend::Memory => {
                info!("using in-memory sheet backend");
                Arc::new(MemorySheet::new())
            }
            SheetBackend::Google => {
                let account = account
                    .clone()
                    .context("GOOGLE_CREDENTIALS_JSON is required for the google backend")?;
                let spreadsheet_id = config
                    .spreadsheet_id
                    .clone()
                    .context("SPREADSHEET_ID is required for the google backend")?;
                let tokens = Arc::new(TokenSource::new(account, SHEETS_SCOPE, http.clone())?);
                info!(account = %tokens.client_email(), "using google sheets backend");
                Arc::new(GoogleSheets::new(spreadsheet_id, http.clone(), tokens))
            }
        };

        let base_url = config.openai_base_url.as_deref();
        let chat: Arc<dyn CompletionClient> = Arc::new(OpenAiChat::new(
            config.openai_api_key.clone(),
            base_url,
            config.provider_timeout_secs,
        )?);
        let images: Arc<dyn ImageGenerator> = Arc::new(OpenAiImages::new(
            config.openai_api_key.clone(),
            base_url,
            config.provider_timeout_secs,
        )?);

        let mut image_pipeline: Option<Arc<dyn CompletionClient>> = None;
        let mut runners = Vec::with_capacity(jobs.len());
        for job in jobs {
            let client = match job.kind {
                JobKind::Completion => chat.clone(),
                JobKind::Image => match &image_pipeline {
                    Some(p) => p.clone(),
                    None => {
                        let account = account.clone().with_context(|| {
                            format!("job {}: image jobs need GOOGLE_CREDENTIALS_JSON for drive", job.name)
                        })?;
                        let tokens = Arc::new(TokenSource::new(account, DRIVE_SCOPE, http.clone())?);
                        let store = Arc::new(DriveStore::new(
                            config.drive_folder_id.clone(),
                            http.clone(),
                            tokens,
                        ));
                        let p: Arc<dyn CompletionClient> =
                            Arc::new(ImageToStorage::new(images.clone(), store));
                        image_pipeline = Some(p.clone());
                        p
                    }
                },
            };
            info!(
                job = %job.name,
                sheet = %job.sheet,
                cursor_cell = %job.cursor_cell,
                batch_size = job.batch_size,
                "job registered"
            );
            runners.push(JobRunner::new(job, sheet.clone(), client));
        }

        Ok(Self::new(runners, Some(images)))
    }
}
