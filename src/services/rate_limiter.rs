// src/services/rate_limiter.rs - Fixed-window and token-bucket limiting
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use uuid::Uuid;

use crate::config::RateLimitSettings;
use crate::counter_store::{CounterScript, CounterStore};
use crate::errors::{CounterResult, CounterStoreError, ServiceError, ServiceResult};
use crate::models::{FixedWindowResult, RateLimitInfo, TokenBucketResult};

/// Counts hits on `key` in a window that starts with the first hit and resets
/// only when the key expires. Hits past the limit still count.
pub async fn check_fixed_window(
    store: &dyn CounterStore,
    key: &str,
    limit: u64,
    window_seconds: u64,
) -> CounterResult<FixedWindowResult> {
    let count = store.increment(key).await?.max(0) as u64;

    if count == 1 {
        // First hit opens the window
        store.set_expiry(key, window_seconds).await?;
    }

    let reset_seconds = match store.ttl(key).await? {
        Some(ttl) if ttl > 0 => ttl,
        Some(_) => window_seconds,
        None => {
            // A counter without expiry would never reset
            warn!("Rate limit key {} had no expiry, restoring window", key);
            store.set_expiry(key, window_seconds).await?;
            window_seconds
        }
    };

    Ok(FixedWindowResult {
        allowed: count <= limit,
        remaining: limit.saturating_sub(count),
        reset_seconds,
    })
}

/// Continuous-refill token bucket, evaluated atomically by the store.
///
/// `ttl_seconds` defaults to twice the window so idle identities age out.
pub async fn check_token_bucket(
    store: &dyn CounterStore,
    key: &str,
    capacity: u64,
    window_seconds: u64,
    cost: u64,
    ttl_seconds: Option<u64>,
    now: DateTime<Utc>,
) -> CounterResult<TokenBucketResult> {
    let capacity_f = capacity as f64;
    let refill_rate = capacity_f / window_seconds.max(1) as f64;
    let now_seconds = now.timestamp_millis() as f64 / 1000.0;
    let ttl = ttl_seconds.unwrap_or(window_seconds * 2);

    let reply = store
        .run_script(
            CounterScript::TokenBucket,
            &[key.to_string()],
            &[capacity_f, refill_rate, now_seconds, cost as f64, ttl as f64],
        )
        .await?;

    match reply.as_slice() {
        [allowed, tokens, retry_after] => Ok(TokenBucketResult {
            allowed: *allowed == 1,
            remaining: (*tokens).max(0) as u64,
            retry_after: (*retry_after).max(0) as u64,
        }),
        other => Err(CounterStoreError::Corrupt {
            key: key.to_string(),
            message: format!("token bucket returned {} values", other.len()),
        }),
    }
}

/// Applies the deployment's limits to the two throttled surfaces.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    /// Pinned limits; `None` re-reads the environment on every check
    settings: Option<RateLimitSettings>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            settings: None,
        }
    }

    pub fn with_settings(store: Arc<dyn CounterStore>, settings: RateLimitSettings) -> Self {
        Self {
            store,
            settings: Some(settings),
        }
    }

    fn settings(&self) -> RateLimitSettings {
        self.settings.unwrap_or_else(RateLimitSettings::from_env)
    }

    /// Fixed-window limit on anonymous redirect traffic, keyed by client.
    pub async fn limit_redirect(&self, client_identity: &str) -> ServiceResult<RateLimitInfo> {
        let settings = self.settings();
        let key = format!("rl:redirect:{}", client_identity);

        let result = check_fixed_window(
            self.store.as_ref(),
            &key,
            settings.redirect_limit,
            settings.redirect_window_seconds,
        )
        .await?;

        let info = RateLimitInfo {
            limit: settings.redirect_limit,
            remaining: result.remaining,
            retry_after: if result.allowed { 0 } else { result.reset_seconds },
        };

        if !result.allowed {
            debug!("Redirect rate limit hit for {}", client_identity);
            return Err(ServiceError::RateLimited(info));
        }
        Ok(info)
    }

    /// Token-bucket limit on link creation, keyed by API key.
    pub async fn limit_create(
        &self,
        api_key_id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<RateLimitInfo> {
        let settings = self.settings();
        let key = format!("rl:create:{}", api_key_id);

        let result = check_token_bucket(
            self.store.as_ref(),
            &key,
            settings.create_capacity,
            settings.create_window_seconds,
            1,
            None,
            now,
        )
        .await?;

        let info = RateLimitInfo {
            limit: settings.create_capacity,
            remaining: result.remaining,
            retry_after: result.retry_after,
        };

        if !result.allowed {
            debug!("Create rate limit hit for key {}", api_key_id);
            return Err(ServiceError::RateLimited(info));
        }
        Ok(info)
    }
}
