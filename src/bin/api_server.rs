// HTTP API server binary for sheet-enricher

use anyhow::Result;
use sheet_enricher::api::{ApiServer, AppState};
use sheet_enricher::config::AppConfig;
use sheet_enricher::logging::init_tracing;
use sheet_enricher::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    // Load dotenv before the filter is read so RUST_LOG in .env applies
    env_util::init_env();
    init_tracing("info,actix_web=info,reqwest=warn")?;

    tracing::info!("Initializing sheet-enricher API server");

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    let server = ApiServer::from_env()?;

    server.run(state).await?;

    Ok(())
}
