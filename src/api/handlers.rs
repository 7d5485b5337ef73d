// HTTP request handlers for API endpoints

use actix_web::{web, HttpResponse, Result};

use crate::api::models::*;
use crate::api::state::AppState;
use crate::batch::runner::RunOutcome;

const DEFAULT_IMAGE_PROMPT: &str = "Four women in their 20s gathered around a kitchen island, \
packing stainless steel lunchboxes with protein balls, nuts, and fruit. One is sealing a kraft \
pouch. A water bottle and cloth napkins are visible. Casual tees, relaxed vibe.";

fn unknown_job(name: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::<()>::error(format!("unknown job '{name}'")))
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        jobs: state.job_names(),
        uptime_seconds: state.uptime().as_secs(),
    });
    Ok(HttpResponse::Ok().json(response))
}

/// Process the next window of rows for a job
pub async fn generate_batch(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    let Some(runner) = state.runner(&name) else {
        return Ok(unknown_job(&name));
    };

    tracing::info!(job = %name, "batch run requested");

    match runner.run().await {
        Ok(RunOutcome::Processed(summary)) => {
            let response = ApiResponse::success(BatchResponse {
                message: format!(
                    "Processed rows {} to {}",
                    summary.first_row, summary.last_row
                ),
                status: BatchStatus::Processed,
                job: summary.job,
                first_row: Some(summary.first_row),
                last_row: Some(summary.last_row),
                rows: summary.rows,
                next_cursor: summary.next_cursor,
                stats: Some(summary.stats),
            });
            Ok(HttpResponse::Ok().json(response))
        }
        Ok(RunOutcome::AllProcessed { cursor }) => {
            let response = ApiResponse::success(BatchResponse {
                message: "All rows processed".to_string(),
                status: BatchStatus::AllProcessed,
                job: name,
                first_row: None,
                last_row: None,
                rows: 0,
                next_cursor: cursor,
                stats: None,
            });
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            tracing::error!(job = %name, error = %e, "batch run failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(format!("Batch failed: {e}"))))
        }
    }
}

/// Move a job's cursor back to its start row
pub async fn reset_cursor(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    let Some(runner) = state.runner(&name) else {
        return Ok(unknown_job(&name));
    };

    match runner.reset().await {
        Ok(cursor) => Ok(HttpResponse::Ok().json(ApiResponse::success(ResetResponse {
            message: format!("Cursor reset to {cursor}"),
            job: name,
            cursor,
        }))),
        Err(e) => {
            tracing::error!(job = %name, error = %e, "cursor reset failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(format!("Reset failed: {e}"))))
        }
    }
}

/// Generate a single image outside any job (smoke test for the image backend)
pub async fn generate_image_test(
    query: web::Query<ImageTestQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(images) = state.images() else {
        return Ok(HttpResponse::ServiceUnavailable()
            .json(ApiResponse::<()>::error("no image backend configured")));
    };
    let prompt = query
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_IMAGE_PROMPT);

    match images.generate(prompt).await {
        Ok(image_url) => Ok(HttpResponse::Ok().json(ApiResponse::success(ImageTestResponse {
            image_url,
        }))),
        Err(e) => {
            tracing::error!(error = %e, "image generation failed");
            Ok(HttpResponse::InternalServerError().json(ApiResponse::<()>::error(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::configure_routes;
    use crate::batch::runner::JobRunner;
    use crate::config::{parse_jobs, JobDefaults};
    use crate::error::ProviderError;
    use crate::providers::{CompletionClient, CompletionOptions, ImageGenerator};
    use crate::sheet::MemorySheet;
    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Stub {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for Stub {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("handle=a") {
                Ok("Score: B\nNote: fine".into())
            } else {
                Ok("Score: D\nNote: ok".into())
            }
        }
    }

    struct Painter;

    #[async_trait]
    impl ImageGenerator for Painter {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            Ok(format!("https://img.example/{}.png", prompt.len()))
        }
    }

    fn state(sheet: Arc<MemorySheet>, stub: Arc<Stub>, images: bool) -> web::Data<AppState> {
        let raw = r#"[{
            "name": "scores",
            "sheet": "Products",
            "cursor_cell": "Z1",
            "columns": { "handle": "A", "title": "B" },
            "group_key": "handle",
            "prompt": "handle={handle} title={title}",
            "fields": [
                { "name": "score", "label": "Score", "column": "C", "kind": "grade" },
                { "name": "note", "label": "Note", "column": "D" }
            ],
            "strategy": { "mode": "concurrent", "limit": 2 }
        }]"#;
        let job = parse_jobs(raw)
            .unwrap()
            .remove(0)
            .compile(&JobDefaults::default())
            .unwrap();
        let images: Option<Arc<dyn ImageGenerator>> = if images {
            Some(Arc::new(Painter))
        } else {
            None
        };
        web::Data::new(AppState::new(vec![JobRunner::new(job, sheet, stub)], images))
    }

    fn seeded() -> Arc<MemorySheet> {
        Arc::new(MemorySheet::new().with_rows(
            "Products",
            2,
            &[&["a", "Widget"], &["a", "Widget XL"], &["b", "Gadget"]],
        ))
    }

    #[actix_web::test]
    async fn batch_then_all_processed_then_reset() {
        let sheet = seeded();
        let stub = Arc::new(Stub {
            calls: AtomicUsize::new(0),
        });
        let app = test::init_service(
            App::new()
                .app_data(state(sheet.clone(), stub.clone(), false))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/generate-scores-batch").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["message"], "Processed rows 2 to 4");
        assert_eq!(body["data"]["stats"]["api_calls"], 2);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sheet.get("Products", "C3").as_deref(), Some("B"));
        assert_eq!(sheet.get("Products", "D4").as_deref(), Some("ok"));
        assert_eq!(sheet.get("Products", "Z1").as_deref(), Some("5"));

        let req = test::TestRequest::get().uri("/generate-scores-batch").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "all_processed");
        assert_eq!(body["data"]["next_cursor"], 5);

        let req = test::TestRequest::get().uri("/reset-scores").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["message"], "Cursor reset to 2");
        assert_eq!(sheet.get("Products", "Z1").as_deref(), Some("2"));
    }

    #[actix_web::test]
    async fn unknown_jobs_and_transport_failures() {
        let sheet = seeded();
        let stub = Arc::new(Stub {
            calls: AtomicUsize::new(0),
        });
        let app = test::init_service(
            App::new()
                .app_data(state(sheet.clone(), stub, false))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/generate-nope-batch").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/reset-nope").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        sheet.fail_reads(true);
        let req = test::TestRequest::get().uri("/generate-scores-batch").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Batch failed:"));

        let req = test::TestRequest::get().uri("/generate-image-test").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[actix_web::test]
    async fn image_test_and_health() {
        let stub = Arc::new(Stub {
            calls: AtomicUsize::new(0),
        });
        let app = test::init_service(
            App::new()
                .app_data(state(seeded(), stub, true))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/generate-image-test?prompt=red%20bowl")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["imageUrl"], "https://img.example/8.png");

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["jobs"][0], "scores");
    }
}
