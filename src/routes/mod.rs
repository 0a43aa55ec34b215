use actix_web::{web, HttpResponse, Responder};

use crate::errors::AppError;
use crate::types::{AppState, CounterStoreHealth, HealthStatus, ResponsePayload};

mod link;
mod redirect;

// Handler function for the root route "/"
async fn index() -> impl Responder {
    let welcome_message = ResponsePayload {
        status: 200,
        message: String::from("Welcome to shortlink"),
    };

    HttpResponse::Ok().json(welcome_message)
}

// Handler function for the health check endpoint
async fn health_check(data: web::Data<AppState>) -> impl Responder {
    let uptime = data.start_time.elapsed().as_secs();

    let db_health = data.db.health_check().await;
    let db_ok = db_health.healthy;

    let counter_store = match data.counter_store.ping().await {
        Ok(()) => CounterStoreHealth {
            backend: data.counter_store.backend_name().to_string(),
            reachable: true,
            message: None,
        },
        Err(e) => CounterStoreHealth {
            backend: data.counter_store.backend_name().to_string(),
            reachable: false,
            message: Some(e.to_string()),
        },
    };

    let healthy = db_ok && counter_store.reachable;
    let status = HealthStatus {
        status: String::from(if healthy { "OK" } else { "DEGRADED" }),
        version: data.version.clone(),
        db_health,
        counter_store,
        uptime_seconds: uptime,
    };

    if healthy {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::ServiceUnavailable().json(status)
    }
}

// Malformed bodies and query strings get the same error envelope as everything else
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _| AppError::Validation(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _| AppError::Validation(err.to_string()).into())
}

// Configure all routes function
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).app_data(query_config());

    cfg.route("/", web::get().to(index));
    cfg.route("/health", web::get().to(health_check));
    link::configure_routes(cfg);
    redirect::configure_routes(cfg);
}
