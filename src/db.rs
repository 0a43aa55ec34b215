use std::time::{Duration, Instant};

use log::{debug, error, info};
use serde::Serialize;
use sqlx::migrate::MigrateDatabase;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use url::Url;

use crate::config::DatabaseConfig;
use crate::errors::{DatabaseError, DbResult};

/// The process-wide Postgres pool. Cloning shares the pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to database");
        debug!(
            "Pool settings: max={} min={} acquire_timeout={}s",
            config.max_connections, config.min_connections, config.connect_timeout_seconds
        );

        if !config.skip_db_exists_check {
            ensure_database(config).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await
            .inspect_err(|e| error!("Failed to connect to database: {}", e))?;

        if config.use_migrations {
            info!("Applying migrations");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .inspect_err(|e| error!("Migration failed: {}", e))?;
        }

        info!("Database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trips `SELECT version()`; never fails, an unreachable database is
    /// reported as unhealthy.
    pub async fn health_check(&self) -> DatabaseHealth {
        let started = Instant::now();
        let result: Result<(String,), sqlx::Error> = sqlx::query_as("SELECT version()")
            .fetch_one(&self.pool)
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok((version,)) => DatabaseHealth {
                healthy: true,
                latency_ms,
                server_version: Some(version),
                message: None,
            },
            Err(e) => DatabaseHealth {
                healthy: false,
                latency_ms,
                server_version: None,
                message: Some(e.to_string()),
            },
        }
    }

    pub async fn shutdown(&self) {
        info!(
            "Closing database pool ({} connections, {} idle)",
            self.pool.size(),
            self.pool.num_idle()
        );
        self.pool.close().await;
    }
}

async fn ensure_database(config: &DatabaseConfig) -> DbResult<()> {
    let name = database_name(&config.url)?;
    if Postgres::database_exists(&config.url).await? {
        debug!("Database '{}' exists", name);
        return Ok(());
    }
    if !config.create_database_if_missing {
        return Err(DatabaseError::Missing(name));
    }

    info!("Creating database '{}'", name);
    Postgres::create_database(&config.url)
        .await
        .map_err(|e| DatabaseError::Create {
            name: name.clone(),
            reason: e.to_string(),
        })?;
    info!("Created database '{}'", name);
    Ok(())
}

fn database_name(url: &str) -> DbResult<String> {
    let parsed = Url::parse(url).map_err(|e| DatabaseError::InvalidUrl(e.to_string()))?;
    let name = parsed.path().trim_start_matches('/');
    if name.is_empty() {
        return Err(DatabaseError::InvalidUrl(
            "connection string names no database".to_string(),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_ignores_query_parameters() {
        assert_eq!(
            database_name("postgres://u:p@localhost:5432/shortlink?sslmode=disable").unwrap(),
            "shortlink"
        );
    }

    #[test]
    fn url_without_database_is_rejected() {
        assert!(matches!(
            database_name("postgres://localhost:5432"),
            Err(DatabaseError::InvalidUrl(_))
        ));
        assert!(matches!(
            database_name("not a url"),
            Err(DatabaseError::InvalidUrl(_))
        ));
    }
}
