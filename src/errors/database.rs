use thiserror::Error;

/// Startup failures of the durable store: connecting, provisioning, migrating.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Database '{0}' does not exist")]
    Missing(String),

    #[error("Failed to create database '{name}': {reason}")]
    Create { name: String, reason: String },
}

pub type DbResult<T> = Result<T, DatabaseError>;
