use std::sync::Arc;

use actix_web::web;

mod click_buffer;
mod link;
mod link_cache;
pub mod link_policy;
mod rate_limiter;
mod redirect;

pub use click_buffer::{ClickBuffer, ClickFlushWorker};
pub use link::{LinkService, LinkServiceTrait, DEFAULT_PAGE_SIZE, MAX_CODE_ATTEMPTS, MAX_PAGE_SIZE};
pub use link_cache::LinkCache;
pub use rate_limiter::{check_fixed_window, check_token_bucket, RateLimiter};
pub use redirect::RedirectService;

use crate::config::{ClickBufferConfig, LinkCacheConfig};
use crate::counter_store::CounterStore;
use crate::db::Database;
use crate::repositories::{
    ApiKeyRepository, ApiKeyRepositoryTrait, LinkRepository, LinkRepositoryTrait,
};

/// Every service built once per process. HTTP workers receive clones of the
/// same `web::Data` handles, so they all share one counter store client.
#[derive(Clone)]
pub struct Services {
    pub links: web::Data<LinkService>,
    pub redirects: web::Data<RedirectService>,
    pub api_keys: web::Data<dyn ApiKeyRepositoryTrait>,
    link_repository: Arc<dyn LinkRepositoryTrait>,
    link_cache: Arc<LinkCache>,
    click_buffer: Arc<ClickBuffer>,
}

impl Services {
    pub fn new(
        link_repository: Arc<dyn LinkRepositoryTrait>,
        api_keys: Arc<dyn ApiKeyRepositoryTrait>,
        store: Arc<dyn CounterStore>,
        rate_limiter: RateLimiter,
        cache_config: &LinkCacheConfig,
        buffer_config: &ClickBufferConfig,
    ) -> Self {
        let rate_limiter = Arc::new(rate_limiter);
        let link_cache = Arc::new(LinkCache::new(
            store.clone(),
            link_repository.clone(),
            cache_config.ttl_seconds,
        ));
        let click_buffer = Arc::new(ClickBuffer::new(store, buffer_config.last_access_ttl_seconds));

        let links = LinkService::new(
            link_repository.clone(),
            link_cache.clone(),
            click_buffer.clone(),
            rate_limiter.clone(),
        );
        let redirects = RedirectService::new(rate_limiter, link_cache.clone(), click_buffer.clone());

        Self {
            links: web::Data::new(links),
            redirects: web::Data::new(redirects),
            api_keys: web::Data::from(api_keys),
            link_repository,
            link_cache,
            click_buffer,
        }
    }

    /// Wires the Postgres repositories and reads rate limits from the
    /// environment on every check.
    pub fn from_database(
        db: &Database,
        store: Arc<dyn CounterStore>,
        cache_config: &LinkCacheConfig,
        buffer_config: &ClickBufferConfig,
    ) -> Self {
        Self::new(
            Arc::new(LinkRepository::new(db)),
            Arc::new(ApiKeyRepository::new(db)),
            store.clone(),
            RateLimiter::new(store),
            cache_config,
            buffer_config,
        )
    }

    pub fn spawn_flush_worker(&self, buffer_config: &ClickBufferConfig) -> ClickFlushWorker {
        ClickFlushWorker::spawn(
            self.click_buffer.clone(),
            self.link_repository.clone(),
            self.link_cache.clone(),
            buffer_config.flush_interval(),
        )
    }

    /// Service Register
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.links.clone())
            .app_data(self.redirects.clone())
            .app_data(self.api_keys.clone());
    }
}
