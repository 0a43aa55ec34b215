use redis::RedisError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterStoreError {
    /// The backend rejected the command or the connection failed
    #[error("Counter store backend error: {0}")]
    Backend(#[from] RedisError),

    /// The command did not complete within the configured bound
    #[error("Counter store command timed out: {0}")]
    Timeout(String),

    /// A stored value could not be interpreted
    #[error("Corrupt counter store value at {key}: {message}")]
    Corrupt { key: String, message: String },

    /// The backend does not know how to run the requested script
    #[error("Unsupported counter store operation: {0}")]
    Unsupported(String),
}

pub type CounterResult<T> = Result<T, CounterStoreError>;
