use actix_web::web;

use crate::handlers::{probe_handler, redirect_handler};

// Matches any single path segment, so it must be registered last
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{code}")
            .route(web::head().to(probe_handler))
            .route(web::get().to(redirect_handler)),
    );
}
