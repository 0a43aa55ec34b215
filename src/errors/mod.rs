use std::io::Error as IoError;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub mod config;
pub mod counter_store;
pub mod database;
pub mod repository;
pub mod service;

pub use config::ConfigError;
pub use counter_store::{CounterResult, CounterStoreError};
pub use database::{DatabaseError, DbResult};
pub use repository::RepositoryError;
pub use service::{ServiceError, ServiceResult};

use crate::models::{DenyReason, RateLimitInfo};

#[derive(Debug, Error)]
pub enum AppError {
    // Request-level domain errors
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Gone(DenyReason),
    #[error("{0}")]
    Conflict(String),
    #[error("Rate limit exceeded. Try again in {}s.", .0.retry_after)]
    RateLimited(RateLimitInfo),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
    // Infrastructure/system errors
    #[error("Server error: {0}")]
    Server(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Logger error: {0}")]
    Logger(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    /// Stable machine-readable code placed in every error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Gone(_) => "GONE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Internal(_)
            | AppError::Server(_)
            | AppError::Config(_)
            | AppError::Logger(_)
            | AppError::Database(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<CounterStoreError> for AppError {
    fn from(e: CounterStoreError) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::Validation(msg),
            ServiceError::NotFound(msg) => AppError::NotFound(msg),
            ServiceError::Forbidden(msg) => AppError::Forbidden(msg),
            ServiceError::Gone(reason) => AppError::Gone(reason),
            ServiceError::Conflict(msg) => AppError::Conflict(msg),
            ServiceError::RateLimited(info) => AppError::RateLimited(info),
            ServiceError::StoreUnavailable(msg) => AppError::Unavailable(msg),
            ServiceError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_)
            | AppError::Server(_)
            | AppError::Config(_)
            | AppError::Logger(_)
            | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        // Never echo infrastructure details back to clients
        let message = match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "An internal error occurred".to_string(),
            _ => self.to_string(),
        };

        let body = match self {
            AppError::Gone(reason) => json!({
                "error": {
                    "code": self.error_code(),
                    "reason": reason.code(),
                    "message": message,
                }
            }),
            AppError::RateLimited(info) => {
                builder
                    .insert_header(("Retry-After", info.retry_after.to_string()))
                    .insert_header(("X-RateLimit-Limit", info.limit.to_string()))
                    .insert_header(("X-RateLimit-Remaining", info.remaining.to_string()));
                json!({ "error": { "code": self.error_code(), "message": message } })
            }
            _ => json!({ "error": { "code": self.error_code(), "message": message } }),
        };

        builder.json(body)
    }
}
