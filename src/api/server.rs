// API server implementation using actix-web

use crate::api::{middleware, routes, state::AppState};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = crate::util::env::env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = crate::util::env::env_opt("PORT")
            .unwrap_or_else(|| "10000".to_string())
            .trim()
            .parse()
            .context("Invalid PORT")?;

        Ok(Self { host, port })
    }

    /// Start the HTTP server
    pub async fn run(self, state: AppState) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            jobs = ?state.job_names(),
            "Starting sheet-enricher API server"
        );

        let state = web::Data::new(state);

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();

            App::new()
                .app_data(state.clone())
                .wrap(logger)
                .wrap(compress)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
