use thiserror::Error;

use crate::errors::{CounterStoreError, RepositoryError};
use crate::models::{DenyReason, RateLimitInfo};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// No link for the code, or the caller does not own it
    #[error("Not found: {0}")]
    NotFound(String),

    /// The link exists but has been disabled by its owner
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The link expired or used up its click quota
    #[error("Gone: {0}")]
    Gone(DenyReason),

    /// Code or alias already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller exceeded its rate limit
    #[error("Rate limit exceeded, retry in {}s", .0.retry_after)]
    RateLimited(RateLimitInfo),

    /// Counter store or durable store unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Unrecoverable internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DenyReason> for ServiceError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Disabled => ServiceError::Forbidden(reason.to_string()),
            DenyReason::Expired | DenyReason::QuotaExceeded => ServiceError::Gone(reason),
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        if err.is_unavailable() {
            log::error!("Durable store unavailable: {}", err);
            return ServiceError::StoreUnavailable("database unavailable".to_string());
        }
        match err {
            RepositoryError::NotFound(msg) => ServiceError::NotFound(msg),
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            RepositoryError::InvalidData(msg) => ServiceError::Validation(msg),
            RepositoryError::Database(e) => {
                log::error!("Database error: {}", e);
                ServiceError::Internal("A database error occurred".to_string())
            }
        }
    }
}

impl From<CounterStoreError> for ServiceError {
    fn from(err: CounterStoreError) -> Self {
        log::error!("Counter store failure: {}", err);
        ServiceError::StoreUnavailable("counter store unavailable".to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Flatten field errors into a single string
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let reasons = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .clone()
                            .unwrap_or_else(|| e.code.clone())
                            .to_string()
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", field, reasons)
            })
            .collect::<Vec<_>>()
            .join("; ");
        ServiceError::Validation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Input {
        #[validate(range(min = 1, message = "must be positive"))]
        ttl: i64,
    }

    #[test]
    fn validation_errors_are_flattened_per_field() {
        let err = ServiceError::from(Input { ttl: 0 }.validate().unwrap_err());
        match err {
            ServiceError::Validation(message) => assert_eq!(message, "ttl: must be positive"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unreachable_database_is_store_unavailable() {
        let err = ServiceError::from(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, ServiceError::StoreUnavailable(_)));
    }
}
