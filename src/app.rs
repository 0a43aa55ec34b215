use std::time::Instant;

use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{debug, info};

use crate::{
    config::{Config, Environment},
    counter_store,
    db::Database,
    errors::AppError,
    middleware::RequestLogger,
    routes,
    services::Services,
    types::AppState,
};

// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;

// Setup logging with custom format and configuration
fn setup_logging(config: &Config) -> Result<(), AppError> {
    let log_level = match config.app.environment {
        Environment::Development => config.app.log_level.clone(),
        Environment::Testing => "debug,actix_web=info,sqlx=warn".to_string(),
        Environment::Production => "info,actix_web=warn,sqlx=warn".to_string(),
    };

    let env = Env::default()
        .filter_or("RUST_LOG", log_level)
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::try_init_from_env(env)
        .map_err(|e| AppError::Logger(format!("Failed to initialize logger: {}", e)))
}

pub async fn server() -> AppResult<()> {
    let config = Config::load()?;
    setup_logging(&config)?;

    // Capture start time for uptime calculation
    let start_time = Instant::now();

    info!("Starting {} v{}", config.app.name, config.app.version);
    info!("Environment: {:?}", config.app.environment);
    info!(
        "Binding to {}:{} with {} workers",
        config.server.host, config.server.port, config.server.workers
    );

    if config.app.environment == Environment::Development {
        debug!("Full configuration: {:?}", config);
    }

    let db = Database::connect(&config.db).await?;
    let counter_store = counter_store::connect(&config.counter_store).await?;
    info!("Counter store backend: {}", counter_store.backend_name());

    // One set of services per process, shared by every worker
    let services = Services::from_database(
        &db,
        counter_store.clone(),
        &config.link_cache,
        &config.click_buffer,
    );
    let flush_worker = services.spawn_flush_worker(&config.click_buffer);

    let state = web::Data::new(AppState {
        start_time,
        db: db.clone(),
        counter_store,
        version: config.app.version.clone(),
    });
    let app_config = web::Data::new(config.clone());
    let verbose_requests = config.app.environment != Environment::Production;

    let served = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            // Make the full configuration available to handlers
            .app_data(app_config.clone())
            .wrap(RequestLogger::new(verbose_requests))
            .configure(|cfg| services.register(cfg))
            .configure(routes::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.to_string(), config.server.port))?
    .run()
    .await;

    // Pending clicks must reach the database before the pool closes
    info!("HTTP server stopped, draining click buffer");
    flush_worker.stop().await;
    db.shutdown().await;

    served?;
    Ok(())
}
