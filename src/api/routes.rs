// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // Registered before the job pattern so it never resolves as a job name
        .route(
            "/generate-image-test",
            web::get().to(handlers::generate_image_test),
        )
        // Batch control, one pair per configured job
        .route(
            "/generate-{job}-batch",
            web::get().to(handlers::generate_batch),
        )
        .route("/reset-{job}", web::get().to(handlers::reset_cursor));
}
