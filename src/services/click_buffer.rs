// src/services/click_buffer.rs - Write-behind click accounting
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::counter_store::CounterStore;
use crate::errors::{CounterResult, ServiceResult};
use crate::models::PendingClicks;
use crate::repositories::LinkRepositoryTrait;
use crate::services::LinkCache;

const CLICKS_PREFIX: &str = "clicks:";
const LAST_ACCESS_PREFIX: &str = "last_access:";

/// Buffers click increments in the counter store until the flush sweep moves
/// them into the durable `links` row.
///
/// Pending counts never expire. The pending last-access timestamp does, which
/// bounds how stale it can get if the sweep stalls.
pub struct ClickBuffer {
    store: Arc<dyn CounterStore>,
    last_access_ttl_seconds: u64,
}

impl ClickBuffer {
    pub fn new(store: Arc<dyn CounterStore>, last_access_ttl_seconds: u64) -> Self {
        Self {
            store,
            last_access_ttl_seconds,
        }
    }

    fn clicks_key(code: &str) -> String {
        format!("{}{}", CLICKS_PREFIX, code)
    }

    fn last_access_key(code: &str) -> String {
        format!("{}{}", LAST_ACCESS_PREFIX, code)
    }

    /// Counts one click. Once the increment lands the click is owed to the
    /// durable row, so a failed last-access write is only logged.
    pub async fn record_click(&self, code: &str, at: DateTime<Utc>) -> CounterResult<()> {
        self.store.increment(&Self::clicks_key(code)).await?;
        if let Err(e) = self
            .store
            .set_with_expiry(
                &Self::last_access_key(code),
                &at.to_rfc3339(),
                self.last_access_ttl_seconds,
            )
            .await
        {
            warn!("Failed to buffer last access for {}: {}", code, e);
        }
        Ok(())
    }

    /// Unflushed clicks for `code`, 0 when none are buffered.
    pub async fn peek_pending(&self, code: &str) -> CounterResult<i64> {
        match self.store.get(&Self::clicks_key(code)).await? {
            Some(raw) => Ok(parse_delta(code, &raw).unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Atomically takes every pending delta out of the buffer.
    pub async fn drain_all(&self) -> CounterResult<Vec<PendingClicks>> {
        let mut batch = Vec::new();
        self.drain_into(&mut batch).await?;
        Ok(batch)
    }

    /// Drains into `batch` so that entries taken before a mid-sweep error are
    /// still handed back to the caller.
    async fn drain_into(&self, batch: &mut Vec<PendingClicks>) -> CounterResult<()> {
        let keys = self.store.scan_keys(CLICKS_PREFIX).await?;

        for key in keys {
            let code = &key[CLICKS_PREFIX.len()..];

            // Another sweep may have taken it since the scan
            let Some(raw) = self.store.get_and_delete(&key).await? else {
                continue;
            };
            let last_accessed_at = self
                .store
                .get_and_delete(&Self::last_access_key(code))
                .await?
                .and_then(|raw| parse_timestamp(code, &raw));

            match parse_delta(code, &raw) {
                Some(delta) if delta > 0 => batch.push(PendingClicks {
                    code: code.to_string(),
                    delta,
                    last_accessed_at,
                }),
                _ => {}
            }
        }

        Ok(())
    }

    /// Puts drained entries back after a failed durable write.
    async fn restore(&self, batch: &[PendingClicks]) {
        for pending in batch {
            if let Err(e) = self
                .store
                .increment_by(&Self::clicks_key(&pending.code), pending.delta)
                .await
            {
                error!(
                    "Lost {} buffered clicks for {}: {}",
                    pending.delta, pending.code, e
                );
                continue;
            }

            let Some(at) = pending.last_accessed_at else {
                continue;
            };
            let key = Self::last_access_key(&pending.code);
            // A click recorded since the drain carries a newer timestamp
            match self.store.get(&key).await {
                Ok(None) => {
                    if let Err(e) = self
                        .store
                        .set_with_expiry(&key, &at.to_rfc3339(), self.last_access_ttl_seconds)
                        .await
                    {
                        warn!("Failed to restore last access for {}: {}", pending.code, e);
                    }
                }
                Ok(Some(_)) => {}
                Err(e) => warn!("Failed to restore last access for {}: {}", pending.code, e),
            }
        }
    }

    /// One sweep: drain, apply in a single transaction, then drop the cached
    /// snapshots of every flushed code. Returns the number of codes applied.
    pub async fn flush_once(
        &self,
        repository: &dyn LinkRepositoryTrait,
        cache: &LinkCache,
    ) -> ServiceResult<usize> {
        let mut batch = Vec::new();
        let drained = self.drain_into(&mut batch).await;

        if !batch.is_empty() {
            if let Err(e) = repository.apply_click_deltas(&batch).await {
                self.restore(&batch).await;
                return Err(e.into());
            }

            for pending in &batch {
                if let Err(e) = cache.invalidate(&pending.code).await {
                    warn!("Failed to invalidate cache for {}: {}", pending.code, e);
                }
            }

            let clicks: i64 = batch.iter().map(|p| p.delta).sum();
            debug!("Flushed {} clicks across {} links", clicks, batch.len());
        }

        drained?;
        Ok(batch.len())
    }
}

fn parse_delta(code: &str, raw: &str) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(delta) => Some(delta),
        Err(e) => {
            warn!("Ignoring unreadable click count for {}: {}", code, e);
            None
        }
    }
}

fn parse_timestamp(code: &str, raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(e) => {
            warn!("Ignoring unreadable last access for {}: {}", code, e);
            None
        }
    }
}

/// Background task that runs [`ClickBuffer::flush_once`] on a fixed interval.
///
/// Request handlers never wait on it. [`ClickFlushWorker::stop`] lets an
/// in-flight sweep finish, runs one final sweep and waits for the task.
pub struct ClickFlushWorker {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ClickFlushWorker {
    pub fn spawn(
        buffer: Arc<ClickBuffer>,
        repository: Arc<dyn LinkRepositoryTrait>,
        cache: Arc<LinkCache>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = buffer.flush_once(repository.as_ref(), &cache).await {
                            error!("Click flush failed, retrying next cycle: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Shutdown signal received, flushing click buffer");
                        match buffer.flush_once(repository.as_ref(), &cache).await {
                            Ok(count) => info!("Final click flush applied {} links", count),
                            Err(e) => error!("Final click flush failed: {}", e),
                        }
                        break;
                    }
                }
            }
        });

        info!("Click flush worker started, interval {:?}", interval);
        Self { shutdown_tx, handle }
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!("Click flush worker ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::{MemoryCounterStore, MockCounterStore};
    use crate::errors::{CounterStoreError, RepositoryError};
    use crate::repositories::MockLinkRepositoryTrait;
    use mockall::predicate::{always, eq};
    use std::sync::atomic::{AtomicI64, Ordering};

    type Fixture = (
        Arc<MemoryCounterStore>,
        ClickBuffer,
        Arc<LinkCache>,
        Arc<dyn LinkRepositoryTrait>,
    );

    fn setup(repo: MockLinkRepositoryTrait) -> Fixture {
        let store = Arc::new(MemoryCounterStore::new());
        let repo: Arc<dyn LinkRepositoryTrait> = Arc::new(repo);
        let buffer = ClickBuffer::new(store.clone(), 300);
        let cache = Arc::new(LinkCache::new(store.clone(), repo.clone(), 60));
        (store, buffer, cache, repo)
    }

    #[tokio::test]
    async fn record_and_peek() {
        let (_, buffer, _, _) = setup(MockLinkRepositoryTrait::new());
        let now = Utc::now();

        assert_eq!(buffer.peek_pending("abc").await.unwrap(), 0);
        buffer.record_click("abc", now).await.unwrap();
        buffer.record_click("abc", now).await.unwrap();
        assert_eq!(buffer.peek_pending("abc").await.unwrap(), 2);
        assert_eq!(buffer.peek_pending("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn click_counts_even_if_last_access_write_fails() {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .with(eq("clicks:abc"))
            .times(1)
            .returning(|_| Ok(1));
        store
            .expect_set_with_expiry()
            .with(eq("last_access:abc"), always(), eq(300))
            .times(1)
            .returning(|_, _, _| Err(CounterStoreError::Timeout("SET".to_string())));

        let buffer = ClickBuffer::new(Arc::new(store), 300);

        assert!(buffer.record_click("abc", Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn failed_increment_is_reported_and_skips_last_access() {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .returning(|_| Err(CounterStoreError::Timeout("INCR".to_string())));
        store.expect_set_with_expiry().never();

        let buffer = ClickBuffer::new(Arc::new(store), 300);

        assert!(matches!(
            buffer.record_click("abc", Utc::now()).await,
            Err(CounterStoreError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn pending_count_has_no_expiry_but_last_access_does() {
        let (store, buffer, _, _) = setup(MockLinkRepositoryTrait::new());
        buffer.record_click("abc", Utc::now()).await.unwrap();

        assert_eq!(store.ttl("clicks:abc").await.unwrap(), None);
        assert_eq!(store.ttl("last_access:abc").await.unwrap(), Some(300));
    }

    #[tokio::test]
    async fn second_sweep_without_clicks_applies_nothing() {
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_apply_click_deltas()
            .withf(|batch| batch.len() == 1 && batch[0].code == "abc" && batch[0].delta == 2)
            .times(1)
            .returning(|batch| Ok(batch.len() as u64));
        let (_, buffer, cache, repo) = setup(repo);
        let now = Utc::now();

        buffer.record_click("abc", now).await.unwrap();
        buffer.record_click("abc", now).await.unwrap();

        assert_eq!(buffer.flush_once(repo.as_ref(), &cache).await.unwrap(), 1);
        assert_eq!(buffer.flush_once(repo.as_ref(), &cache).await.unwrap(), 0);
        assert_eq!(buffer.peek_pending("abc").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn drain_carries_last_access_timestamp() {
        let (_, buffer, _, _) = setup(MockLinkRepositoryTrait::new());
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        buffer.record_click("abc", at).await.unwrap();
        let drained = buffer.drain_all().await.unwrap();

        assert_eq!(
            drained,
            vec![PendingClicks {
                code: "abc".to_string(),
                delta: 1,
                last_accessed_at: Some(at),
            }]
        );
        assert!(buffer.drain_all().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_last_access_leaves_durable_value_alone() {
        let (_, buffer, _, _) = setup(MockLinkRepositoryTrait::new());
        buffer.record_click("abc", Utc::now()).await.unwrap();

        time::advance(Duration::from_secs(301)).await;

        let drained = buffer.drain_all().await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].delta, 1);
        assert_eq!(drained[0].last_accessed_at, None);
    }

    #[tokio::test]
    async fn failed_apply_puts_clicks_back() {
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_apply_click_deltas()
            .times(1)
            .returning(|_| Err(RepositoryError::Database(sqlx::Error::PoolTimedOut)));
        let (store, buffer, cache, repo) = setup(repo);
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        buffer.record_click("abc", at).await.unwrap();
        buffer.record_click("abc", at).await.unwrap();

        assert!(buffer.flush_once(repo.as_ref(), &cache).await.is_err());
        assert_eq!(buffer.peek_pending("abc").await.unwrap(), 2);
        assert_eq!(
            store.get("last_access:abc").await.unwrap(),
            Some(at.to_rfc3339())
        );
    }

    #[tokio::test]
    async fn successful_flush_drops_cached_snapshot() {
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_apply_click_deltas().returning(|_| Ok(1));
        let (store, buffer, cache, repo) = setup(repo);
        store.set_with_expiry("link:abc", "{}", 60).await.unwrap();
        store.set_with_expiry("link:xyz", "{}", 60).await.unwrap();

        buffer.record_click("abc", Utc::now()).await.unwrap();
        buffer.flush_once(repo.as_ref(), &cache).await.unwrap();

        assert_eq!(store.get("link:abc").await.unwrap(), None);
        assert!(store.get("link:xyz").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unreadable_counts_are_dropped() {
        let (store, buffer, _, _) = setup(MockLinkRepositoryTrait::new());
        store.set_with_expiry("clicks:bad", "many", 60).await.unwrap();
        buffer.record_click("good", Utc::now()).await.unwrap();

        let drained = buffer.drain_all().await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].code, "good");
        assert_eq!(store.get("clicks:bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn worker_flushes_remaining_clicks_on_stop() {
        let applied = Arc::new(AtomicI64::new(0));
        let counter = applied.clone();
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_apply_click_deltas().returning(move |batch| {
            counter.fetch_add(batch.iter().map(|p| p.delta).sum(), Ordering::SeqCst);
            Ok(batch.len() as u64)
        });
        let (_, buffer, cache, repo) = setup(repo);
        let buffer = Arc::new(buffer);

        let worker = ClickFlushWorker::spawn(
            buffer.clone(),
            repo,
            cache,
            Duration::from_secs(3600),
        );

        for _ in 0..3 {
            buffer.record_click("abc", Utc::now()).await.unwrap();
        }
        worker.stop().await;

        assert_eq!(applied.load(Ordering::SeqCst), 3);
        assert_eq!(buffer.peek_pending("abc").await.unwrap(), 0);
    }
}
