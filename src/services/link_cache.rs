// src/services/link_cache.rs - Read-through cache of link snapshots
use std::sync::Arc;

use log::{debug, warn};

use crate::counter_store::CounterStore;
use crate::errors::{CounterResult, ServiceResult};
use crate::models::LinkSnapshot;
use crate::repositories::LinkRepositoryTrait;

const CACHE_PREFIX: &str = "link:";
const GENERATION_PREFIX: &str = "link_gen:";

/// Caches [`LinkSnapshot`]s in the counter store for a bounded TTL, filling
/// from the durable store on miss. Unknown codes are never cached.
///
/// Every invalidation bumps a per-code generation. A fill whose generation
/// moved while it was reading the row drops its own entry, so a snapshot read
/// before a flush or patch committed cannot outlive that write.
pub struct LinkCache {
    store: Arc<dyn CounterStore>,
    repository: Arc<dyn LinkRepositoryTrait>,
    ttl_seconds: u64,
}

impl LinkCache {
    pub fn new(
        store: Arc<dyn CounterStore>,
        repository: Arc<dyn LinkRepositoryTrait>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            store,
            repository,
            ttl_seconds,
        }
    }

    pub fn cache_key(code: &str) -> String {
        format!("{}{}", CACHE_PREFIX, code)
    }

    fn generation_key(code: &str) -> String {
        format!("{}{}", GENERATION_PREFIX, code)
    }

    pub async fn get_link(&self, code: &str) -> ServiceResult<Option<LinkSnapshot>> {
        let key = Self::cache_key(code);
        let generation_key = Self::generation_key(code);

        if let Some(raw) = self.store.get(&key).await? {
            match serde_json::from_str::<LinkSnapshot>(&raw) {
                Ok(snapshot) => {
                    debug!("Link cache hit for {}", code);
                    return Ok(Some(snapshot));
                }
                Err(e) => warn!("Discarding unreadable cache entry for {}: {}", code, e),
            }
        }

        debug!("Link cache miss for {}", code);
        let generation = self.store.get(&generation_key).await?;
        let Some(link) = self.repository.find_by_code(code).await? else {
            return Ok(None);
        };

        let snapshot = LinkSnapshot::from(&link);
        match serde_json::to_string(&snapshot) {
            Ok(raw) => self.fill(code, &raw, generation).await,
            Err(e) => warn!("Failed to serialize snapshot for {}: {}", code, e),
        }

        Ok(Some(snapshot))
    }

    /// Stores `raw` unless the link was invalidated since `generation` was
    /// read. The row was already found, so failures here only cost the next
    /// lookup.
    async fn fill(&self, code: &str, raw: &str, generation: Option<String>) {
        let key = Self::cache_key(code);
        if let Err(e) = self.store.set_with_expiry(&key, raw, self.ttl_seconds).await {
            warn!("Failed to populate link cache for {}: {}", code, e);
            return;
        }

        let unchanged = match self.store.get(&Self::generation_key(code)).await {
            Ok(current) => current == generation,
            Err(e) => {
                warn!("Failed to confirm cache generation for {}: {}", code, e);
                false
            }
        };
        if unchanged {
            return;
        }

        debug!("Link {} changed during cache fill, dropping entry", code);
        if let Err(e) = self.store.delete(&key).await {
            warn!("Failed to drop stale cache entry for {}: {}", code, e);
        }
    }

    /// Drops the cached snapshot so the next lookup reads the durable row.
    /// Call after the durable write has committed.
    pub async fn invalidate(&self, code: &str) -> CounterResult<bool> {
        let generation_key = Self::generation_key(code);
        self.store.increment(&generation_key).await?;
        // Only needs to outlive an in-flight fill
        self.store
            .set_expiry(&generation_key, self.ttl_seconds.max(1))
            .await?;
        self.store.delete(&Self::cache_key(code)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::{MemoryCounterStore, MockCounterStore};
    use crate::models::Link;
    use crate::repositories::MockLinkRepositoryTrait;
    use chrono::Utc;
    use mockall::predicate::{always, eq};
    use uuid::Uuid;

    fn link(code: &str) -> Link {
        Link {
            id: Uuid::new_v4(),
            code: code.to_string(),
            long_url: "https://example.com".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            is_active: true,
            max_clicks: Some(10),
            click_count: 4,
            last_accessed_at: None,
            owner_api_key_id: None,
        }
    }

    #[tokio::test]
    async fn miss_fills_cache_and_hit_skips_database() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_find_by_code()
            .with(eq("abc1234"))
            .times(1)
            .returning(|code| Ok(Some(link(code))));

        let cache = LinkCache::new(store.clone(), Arc::new(repo), 60);

        let first = cache.get_link("abc1234").await.unwrap().unwrap();
        let second = cache.get_link("abc1234").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.click_count, 4);
        assert_eq!(store.ttl("link:abc1234").await.unwrap(), Some(60));
    }

    #[tokio::test]
    async fn unknown_codes_are_not_cached() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_find_by_code().times(2).returning(|_| Ok(None));

        let cache = LinkCache::new(store.clone(), Arc::new(repo), 60);

        assert!(cache.get_link("nope").await.unwrap().is_none());
        assert!(cache.get_link("nope").await.unwrap().is_none());
        assert_eq!(store.get("link:nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_entry_falls_back_to_database() {
        let store = Arc::new(MemoryCounterStore::new());
        store
            .set_with_expiry("link:abc1234", "{not json", 60)
            .await
            .unwrap();
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_find_by_code()
            .times(1)
            .returning(|code| Ok(Some(link(code))));

        let cache = LinkCache::new(store, Arc::new(repo), 60);

        let snapshot = cache.get_link("abc1234").await.unwrap().unwrap();
        assert_eq!(snapshot.long_url, "https://example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_find_by_code()
            .times(2)
            .returning(|code| Ok(Some(link(code))));

        let cache = LinkCache::new(store, Arc::new(repo), 60);
        cache.get_link("abc1234").await.unwrap();

        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        cache.get_link("abc1234").await.unwrap();
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_find_by_code()
            .times(2)
            .returning(|code| Ok(Some(link(code))));

        let cache = LinkCache::new(store, Arc::new(repo), 60);
        cache.get_link("abc1234").await.unwrap();
        assert!(cache.invalidate("abc1234").await.unwrap());
        cache.get_link("abc1234").await.unwrap();
    }

    #[tokio::test]
    async fn invalidate_bumps_generation() {
        let store = Arc::new(MemoryCounterStore::new());
        let cache = LinkCache::new(store.clone(), Arc::new(MockLinkRepositoryTrait::new()), 60);

        assert!(!cache.invalidate("abc1234").await.unwrap());
        assert!(!cache.invalidate("abc1234").await.unwrap());

        assert_eq!(
            store.get("link_gen:abc1234").await.unwrap(),
            Some("2".to_string())
        );
        assert_eq!(store.ttl("link_gen:abc1234").await.unwrap(), Some(60));
    }

    #[tokio::test]
    async fn fill_racing_an_invalidation_is_dropped() {
        let mut store = MockCounterStore::new();
        store
            .expect_get()
            .with(eq("link:abc1234"))
            .times(1)
            .returning(|_| Ok(None));
        // A flush commits and invalidates while the row is being read
        let mut generation_reads = 0;
        store
            .expect_get()
            .with(eq("link_gen:abc1234"))
            .times(2)
            .returning(move |_| {
                generation_reads += 1;
                Ok((generation_reads > 1).then(|| "1".to_string()))
            });
        store
            .expect_set_with_expiry()
            .with(eq("link:abc1234"), always(), eq(60))
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
            .expect_delete()
            .with(eq("link:abc1234"))
            .times(1)
            .returning(|_| Ok(true));

        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_find_by_code()
            .returning(|code| Ok(Some(link(code))));

        let cache = LinkCache::new(Arc::new(store), Arc::new(repo), 60);
        let snapshot = cache.get_link("abc1234").await.unwrap().unwrap();

        assert_eq!(snapshot.click_count, 4);
    }

    #[tokio::test]
    async fn fill_without_invalidation_is_kept() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut repo = MockLinkRepositoryTrait::new();
        repo.expect_find_by_code()
            .times(1)
            .returning(|code| Ok(Some(link(code))));

        let cache = LinkCache::new(store.clone(), Arc::new(repo), 60);
        cache.invalidate("abc1234").await.unwrap();
        cache.get_link("abc1234").await.unwrap();

        assert!(store.get("link:abc1234").await.unwrap().is_some());
    }
}
