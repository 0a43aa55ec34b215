use actix_web::web;

use crate::handlers::{create_handler, list_handler, patch_handler, stats_handler};

// Owner-scoped management API
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/links")
            .route("", web::post().to(create_handler))
            .route("", web::get().to(list_handler))
            .route("/{code}", web::get().to(stats_handler))
            .route("/{code}", web::patch().to(patch_handler)),
    );
}
