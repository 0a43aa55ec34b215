use std::time::Duration;

use ::redis::{aio::ConnectionManager, Client, Cmd, FromRedisValue, Script};
use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::time::timeout;

use super::{CounterScript, CounterStore};
use crate::config::CounterStoreConfig;
use crate::errors::{CounterResult, CounterStoreError};

const SCAN_BATCH: usize = 500;

/// Redis-backed counter store. One multiplexed, auto-reconnecting connection
/// is shared by every request handler and the flush worker.
#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
    command_timeout: Duration,
    token_bucket: Script,
}

impl RedisCounterStore {
    pub async fn connect(config: &CounterStoreConfig) -> CounterResult<Self> {
        info!("Connecting to counter store");
        let client = Client::open(config.url.as_str())?;

        let manager = match timeout(config.connect_timeout(), ConnectionManager::new(client)).await
        {
            Ok(result) => result.map_err(|e| {
                warn!("Failed to connect to counter store: {}", e);
                CounterStoreError::Backend(e)
            })?,
            Err(_) => return Err(CounterStoreError::Timeout("connect".to_string())),
        };

        info!("Successfully connected to counter store");
        Ok(Self {
            manager,
            command_timeout: config.command_timeout(),
            token_bucket: Script::new(CounterScript::TokenBucket.lua()),
        })
    }

    /// Runs one command under the configured timeout.
    async fn run<T: FromRedisValue>(&self, name: &str, cmd: &Cmd) -> CounterResult<T> {
        let mut conn = self.manager.clone();
        match timeout(self.command_timeout, cmd.query_async(&mut conn)).await {
            Ok(result) => result.map_err(CounterStoreError::from),
            Err(_) => Err(CounterStoreError::Timeout(name.to_string())),
        }
    }

    fn script(&self, script: CounterScript) -> &Script {
        match script {
            CounterScript::TokenBucket => &self.token_bucket,
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> CounterResult<Option<String>> {
        let mut cmd = ::redis::cmd("GET");
        cmd.arg(key);
        self.run("GET", &cmd).await
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> CounterResult<()> {
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl_seconds.max(1));
        let _: () = self.run("SET", &cmd).await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> CounterResult<i64> {
        let mut cmd = ::redis::cmd("INCR");
        cmd.arg(key);
        self.run("INCR", &cmd).await
    }

    async fn increment_by(&self, key: &str, delta: i64) -> CounterResult<i64> {
        let mut cmd = ::redis::cmd("INCRBY");
        cmd.arg(key).arg(delta);
        self.run("INCRBY", &cmd).await
    }

    async fn get_and_delete(&self, key: &str) -> CounterResult<Option<String>> {
        let mut cmd = ::redis::cmd("GETDEL");
        cmd.arg(key);
        self.run("GETDEL", &cmd).await
    }

    async fn delete(&self, key: &str) -> CounterResult<bool> {
        let mut cmd = ::redis::cmd("DEL");
        cmd.arg(key);
        let removed: i64 = self.run("DEL", &cmd).await?;
        Ok(removed > 0)
    }

    async fn set_expiry(&self, key: &str, ttl_seconds: u64) -> CounterResult<bool> {
        let mut cmd = ::redis::cmd("EXPIRE");
        cmd.arg(key).arg(ttl_seconds);
        let applied: i64 = self.run("EXPIRE", &cmd).await?;
        Ok(applied == 1)
    }

    async fn ttl(&self, key: &str) -> CounterResult<Option<u64>> {
        let mut cmd = ::redis::cmd("TTL");
        cmd.arg(key);
        // -2 = missing, -1 = no expiry
        let ttl: i64 = self.run("TTL", &cmd).await?;
        Ok((ttl >= 0).then_some(ttl as u64))
    }

    async fn run_script(
        &self,
        script: CounterScript,
        keys: &[String],
        args: &[f64],
    ) -> CounterResult<Vec<i64>> {
        let mut invocation = self.script(script).prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(*arg);
        }

        let mut conn = self.manager.clone();
        match timeout(self.command_timeout, invocation.invoke_async(&mut conn)).await {
            Ok(result) => result.map_err(CounterStoreError::from),
            Err(_) => Err(CounterStoreError::Timeout(script.name().to_string())),
        }
    }

    async fn scan_keys(&self, prefix: &str) -> CounterResult<Vec<String>> {
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let mut cmd = ::redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH);
            let (next, batch): (u64, Vec<String>) = self.run("SCAN", &cmd).await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        debug!("SCAN {} matched {} keys", pattern, keys.len());
        Ok(keys)
    }

    async fn ping(&self) -> CounterResult<()> {
        let cmd = ::redis::cmd("PING");
        let _: String = self.run("PING", &cmd).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
