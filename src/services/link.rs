// src/services/link.rs - Business logic for owner-facing link management
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{RepositoryError, ServiceError};
use crate::models::{
    CreateLinkDto, Link, LinkListItem, LinkListQuery, LinkListResponse, LinkResponseDto, LinkStatsDto,
    NewLink, PatchLinkDto, RateLimitInfo,
};
use crate::repositories::LinkRepositoryTrait;
use crate::services::{ClickBuffer, LinkCache, RateLimiter};
use crate::utils::code_generator::{generate_short_code, DEFAULT_CODE_LENGTH};
use crate::utils::cursor::{decode_cursor, encode_cursor, ListCursor};

type Result<T> = std::result::Result<T, ServiceError>;

/// Generated codes are retried this many times on collision
pub const MAX_CODE_ATTEMPTS: usize = 10;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[async_trait]
pub trait LinkServiceTrait {
    /// Creates a link owned by `owner`. The returned [`RateLimitInfo`] is the
    /// caller's remaining create budget.
    async fn create(
        &self,
        owner: Uuid,
        dto: CreateLinkDto,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> Result<(LinkResponseDto, RateLimitInfo)>;

    async fn list(&self, owner: Uuid, query: LinkListQuery) -> Result<LinkListResponse>;

    async fn stats(&self, owner: Uuid, code: &str) -> Result<LinkStatsDto>;

    async fn patch(&self, owner: Uuid, code: &str, dto: PatchLinkDto) -> Result<LinkStatsDto>;
}

pub struct LinkService {
    repository: Arc<dyn LinkRepositoryTrait>,
    cache: Arc<LinkCache>,
    clicks: Arc<ClickBuffer>,
    rate_limiter: Arc<RateLimiter>,
}

impl LinkService {
    pub fn new(
        repository: Arc<dyn LinkRepositoryTrait>,
        cache: Arc<LinkCache>,
        clicks: Arc<ClickBuffer>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            repository,
            cache,
            clicks,
            rate_limiter,
        }
    }

    fn expires_at(
        now: DateTime<Utc>,
        expires_in_seconds: Option<i64>,
    ) -> Result<Option<DateTime<Utc>>> {
        let Some(seconds) = expires_in_seconds else {
            return Ok(None);
        };
        Duration::try_seconds(seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(Some)
            .ok_or_else(|| ServiceError::Validation("expires_in_seconds is too large".to_string()))
    }

    fn max_clicks(requested: Option<i64>) -> Result<Option<i32>> {
        match requested {
            None | Some(0) => Ok(None),
            Some(n) => i32::try_from(n)
                .map(Some)
                .map_err(|_| ServiceError::Validation("max_clicks is too large".to_string())),
        }
    }

    async fn insert_generated(&self, template: NewLink) -> Result<Link> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let candidate = NewLink {
                code: generate_short_code(DEFAULT_CODE_LENGTH),
                ..template.clone()
            };

            match self.repository.insert(&candidate).await {
                Ok(link) => return Ok(link),
                Err(RepositoryError::Conflict(_)) => {
                    debug!("Generated code {} collided (attempt {})", candidate.code, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Internal(
            "Failed to generate unique short code".to_string(),
        ))
    }
}

#[async_trait]
impl LinkServiceTrait for LinkService {
    async fn create(
        &self,
        owner: Uuid,
        dto: CreateLinkDto,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> Result<(LinkResponseDto, RateLimitInfo)> {
        let limit = self.rate_limiter.limit_create(owner, now).await?;

        dto.validate()?;

        let template = NewLink {
            code: String::new(),
            long_url: dto.url,
            created_at: now,
            expires_at: Self::expires_at(now, dto.expires_in_seconds)?,
            max_clicks: Self::max_clicks(dto.max_clicks)?,
            owner_api_key_id: Some(owner),
        };

        let link = match dto.custom_alias {
            Some(alias) => {
                let new_link = NewLink {
                    code: alias,
                    ..template
                };
                self.repository
                    .insert(&new_link)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::Conflict(_) => {
                            ServiceError::Conflict("Alias already taken".to_string())
                        }
                        other => other.into(),
                    })?
            }
            None => self.insert_generated(template).await?,
        };

        info!("Created link {} for key {}", link.code, owner);
        Ok((LinkResponseDto::from_link(link, base_url), limit))
    }

    async fn list(&self, owner: Uuid, query: LinkListQuery) -> Result<LinkListResponse> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ServiceError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let cursor = match query.cursor.as_deref() {
            Some(raw) => Some(
                decode_cursor(raw)
                    .ok_or_else(|| ServiceError::Validation("Invalid cursor".to_string()))?,
            ),
            None => None,
        };

        // One extra row tells us whether another page exists
        let mut rows = self.repository.list_owned(owner, limit + 1, cursor).await?;
        let has_next = rows.len() as i64 > limit;
        rows.truncate(limit as usize);

        let next_cursor = match rows.last() {
            Some(last) if has_next => Some(encode_cursor(&ListCursor {
                created_at: last.created_at,
                id: last.id,
            })),
            _ => None,
        };

        Ok(LinkListResponse {
            items: rows.into_iter().map(LinkListItem::from).collect(),
            next_cursor,
        })
    }

    async fn stats(&self, owner: Uuid, code: &str) -> Result<LinkStatsDto> {
        let link = self
            .repository
            .find_owned(code, owner)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Link not found".to_string()))?;

        let pending = self.clicks.peek_pending(code).await?;
        Ok(LinkStatsDto::from_link(link, pending))
    }

    async fn patch(&self, owner: Uuid, code: &str, dto: PatchLinkDto) -> Result<LinkStatsDto> {
        let link = self
            .repository
            .update_active(code, owner, dto.is_active)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Link not found".to_string()))?;

        // Without this the redirect path sees the old state until the TTL runs out
        if let Err(e) = self.cache.invalidate(code).await {
            warn!("Failed to invalidate cache for {}: {}", code, e);
        }

        info!("Link {} set is_active={}", code, dto.is_active);
        let pending = self.clicks.peek_pending(code).await?;
        Ok(LinkStatsDto::from_link(link, pending))
    }
}
