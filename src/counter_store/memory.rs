use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{token_bucket_step, CounterScript, CounterStore};
use crate::errors::{CounterResult, CounterStoreError};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn text(value: impl Into<String>) -> Self {
        Entry {
            value: Value::Text(value.into()),
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process counter store with Redis-compatible semantics for the
/// operations this crate uses. Per-key atomicity comes from DashMap's shard
/// locks; a script holds its key's lock for the whole read-compute-write.
///
/// Time is read from `tokio::time`, so tests can pause and advance it.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, Entry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn wrong_type(key: &str) -> CounterStoreError {
        CounterStoreError::Corrupt {
            key: key.to_string(),
            message: "operation against a key holding the wrong kind of value".to_string(),
        }
    }

    fn live_text(&self, key: &str) -> CounterResult<Option<String>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.value {
                Value::Text(text) => Ok(Some(text.clone())),
                Value::Hash(_) => Err(Self::wrong_type(key)),
            },
            _ => Ok(None),
        }
    }

    fn run_token_bucket(&self, keys: &[String], args: &[f64]) -> CounterResult<Vec<i64>> {
        let (key, [capacity, refill_rate, now_ts, cost, ttl]) = match (keys.first(), args) {
            (Some(key), [a, b, c, d, e]) => (key, [*a, *b, *c, *d, *e]),
            _ => {
                return Err(CounterStoreError::Unsupported(
                    "token_bucket expects 1 key and 5 args".to_string(),
                ))
            }
        };

        let now = Instant::now();
        let mut slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
        if !slot.is_live(now) {
            *slot = Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            };
        }

        let fields = match &mut slot.value {
            Value::Hash(fields) => fields,
            Value::Text(_) => return Err(Self::wrong_type(key)),
        };
        let read = |name: &str| fields.get(name).and_then(|v| v.parse::<f64>().ok());
        let step = token_bucket_step(
            read("tokens"),
            read("ts"),
            capacity,
            refill_rate,
            now_ts,
            cost,
        );

        fields.insert("tokens".to_string(), step.tokens.to_string());
        fields.insert("ts".to_string(), now_ts.to_string());
        slot.expires_at = Some(now + Duration::from_secs(ttl.max(0.0) as u64));

        Ok(vec![
            i64::from(step.allowed),
            step.tokens.floor() as i64,
            step.retry_after as i64,
        ])
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> CounterResult<Option<String>> {
        self.live_text(key)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> CounterResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds.max(1));
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str) -> CounterResult<i64> {
        self.increment_by(key, 1).await
    }

    async fn increment_by(&self, key: &str, delta: i64) -> CounterResult<i64> {
        let now = Instant::now();
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::text("0"));
        if !slot.is_live(now) {
            *slot = Entry::text("0");
        }

        let current = match &slot.value {
            Value::Text(text) => text.parse::<i64>().map_err(|e| CounterStoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?,
            Value::Hash(_) => return Err(Self::wrong_type(key)),
        };

        let next = current + delta;
        slot.value = Value::Text(next.to_string());
        Ok(next)
    }

    async fn get_and_delete(&self, key: &str) -> CounterResult<Option<String>> {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, entry)) if entry.is_live(now) => match entry.value {
                Value::Text(text) => Ok(Some(text)),
                Value::Hash(_) => Err(Self::wrong_type(key)),
            },
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> CounterResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn set_expiry(&self, key: &str, ttl_seconds: u64) -> CounterResult<bool> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + Duration::from_secs(ttl_seconds));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> CounterResult<Option<u64>> {
        let now = Instant::now();
        Ok(self.entries.get(key).and_then(|entry| {
            let expires_at = entry.expires_at?;
            if expires_at <= now {
                return None;
            }
            let remaining = expires_at - now;
            Some(remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
        }))
    }

    async fn run_script(
        &self,
        script: CounterScript,
        keys: &[String],
        args: &[f64],
    ) -> CounterResult<Vec<i64>> {
        match script {
            CounterScript::TokenBucket => self.run_token_bucket(keys, args),
        }
    }

    async fn scan_keys(&self, prefix: &str) -> CounterResult<Vec<String>> {
        let now = Instant::now();
        // Expired entries are only ever removed lazily; sweep them here
        self.entries.retain(|_, entry| entry.is_live(now));

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn ping(&self) -> CounterResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
