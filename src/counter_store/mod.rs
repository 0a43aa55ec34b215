//! Contract over the low-latency key/value store that backs rate limiting,
//! the link cache and the click buffer.
//!
//! Every operation is atomic per key. The store is the only synchronisation
//! point between concurrent request handlers, so anything that must be a
//! read-modify-write goes through [`CounterStore::run_script`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CounterStoreConfig;
use crate::errors::CounterResult;

mod memory;
mod redis_store;
mod scripts;

pub use self::memory::MemoryCounterStore;
pub use self::redis_store::RedisCounterStore;
pub use self::scripts::{token_bucket_step, CounterScript, TokenBucketStep};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> CounterResult<Option<String>>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64)
        -> CounterResult<()>;

    /// Atomic +1. A missing key starts at 0 and gets no expiry.
    async fn increment(&self, key: &str) -> CounterResult<i64>;

    async fn increment_by(&self, key: &str, delta: i64) -> CounterResult<i64>;

    /// Atomically returns the value and removes the key.
    async fn get_and_delete(&self, key: &str) -> CounterResult<Option<String>>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> CounterResult<bool>;

    /// Returns whether the key existed and now has the expiry.
    async fn set_expiry(&self, key: &str, ttl_seconds: u64) -> CounterResult<bool>;

    /// Remaining time-to-live in whole seconds; `None` when the key is missing
    /// or has no expiry.
    async fn ttl(&self, key: &str) -> CounterResult<Option<u64>>;

    /// Runs a server-side script as one indivisible unit.
    async fn run_script(
        &self,
        script: CounterScript,
        keys: &[String],
        args: &[f64],
    ) -> CounterResult<Vec<i64>>;

    /// All live keys starting with `prefix`.
    async fn scan_keys(&self, prefix: &str) -> CounterResult<Vec<String>>;

    async fn ping(&self) -> CounterResult<()>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Builds the process-wide counter store handle from configuration.
pub async fn connect(config: &CounterStoreConfig) -> CounterResult<Arc<dyn CounterStore>> {
    if config.is_in_memory() {
        log::warn!("Using in-process counter store; state is not shared across instances");
        return Ok(Arc::new(MemoryCounterStore::new()));
    }

    let store = RedisCounterStore::connect(config).await?;
    Ok(Arc::new(store))
}
