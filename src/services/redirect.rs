// src/services/redirect.rs - Redirect hot path
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{Decision, LinkSnapshot};
use crate::services::link_policy;
use crate::services::{ClickBuffer, LinkCache, RateLimiter};

/// Resolves short codes for visitors: rate limit, cached lookup, buffered
/// click overlay, policy check, then count the click.
pub struct RedirectService {
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<LinkCache>,
    clicks: Arc<ClickBuffer>,
}

impl RedirectService {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<LinkCache>,
        clicks: Arc<ClickBuffer>,
    ) -> Self {
        Self {
            rate_limiter,
            cache,
            clicks,
        }
    }

    /// Returns the destination URL and records one click.
    ///
    /// ### Errors
    /// * `ServiceError::RateLimited` - before any lookup happens
    /// * `ServiceError::NotFound` - unknown code
    /// * `ServiceError::Forbidden` / `ServiceError::Gone` - policy denial, nothing recorded
    /// * `ServiceError::StoreUnavailable` - counter or durable store failure
    pub async fn handle_redirect(
        &self,
        code: &str,
        now: DateTime<Utc>,
        client_identity: &str,
    ) -> ServiceResult<String> {
        self.rate_limiter.limit_redirect(client_identity).await?;

        let snapshot = self.usable_snapshot(code, now).await?;
        self.clicks.record_click(code, now).await?;

        debug!("Redirecting {} to {}", code, snapshot.long_url);
        Ok(snapshot.long_url)
    }

    /// Same checks as [`Self::handle_redirect`] without rate limiting or
    /// counting a click.
    pub async fn probe(&self, code: &str, now: DateTime<Utc>) -> ServiceResult<String> {
        let snapshot = self.usable_snapshot(code, now).await?;
        Ok(snapshot.long_url)
    }

    async fn usable_snapshot(&self, code: &str, now: DateTime<Utc>) -> ServiceResult<LinkSnapshot> {
        let snapshot = self
            .cache
            .get_link(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Link not found".to_string()))?;

        let pending = self.clicks.peek_pending(code).await?;
        let effective = snapshot.click_count + pending;

        match link_policy::evaluate(&snapshot, effective, now) {
            Decision::Allowed => Ok(snapshot),
            Decision::Denied(reason) => {
                debug!("Link {} denied: {}", code, reason.code());
                Err(reason.into())
            }
        }
    }
}
