// src/models/link.rs - Pure data structures
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::validations::{validate_custom_alias, validate_url};

/// Represents a short link row in the durable store
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,

    /// Short code, unique and immutable once created
    pub code: String,

    /// Destination of the redirect
    pub long_url: String,

    pub created_at: DateTime<Utc>,

    /// When this link expires (None means it never expires)
    pub expires_at: Option<DateTime<Utc>>,

    /// Owner-controlled switch
    pub is_active: bool,

    /// Click quota (None means unlimited)
    pub max_clicks: Option<i32>,

    /// Durable click count. Only the flush sweep writes it, so it lags the
    /// true count by whatever is still buffered.
    pub click_count: i64,

    pub last_accessed_at: Option<DateTime<Utc>>,

    /// API key that created the link
    pub owner_api_key_id: Option<Uuid>,
}

/// Fields needed to insert a link. Server-side defaults cover the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_clicks: Option<i32>,
    pub owner_api_key_id: Option<Uuid>,
}

/// Point-in-time copy of the redirect-relevant fields of a [`Link`], stored in
/// the counter store under a short TTL.
///
/// `click_count` is the durable value at fill time. It must be combined with
/// the buffered delta before any quota decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub code: String,
    pub long_url: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_clicks: Option<i32>,
    pub click_count: i64,
}

impl From<&Link> for LinkSnapshot {
    fn from(link: &Link) -> Self {
        LinkSnapshot {
            code: link.code.clone(),
            long_url: link.long_url.clone(),
            is_active: link.is_active,
            expires_at: link.expires_at,
            max_clicks: link.max_clicks,
            click_count: link.click_count,
        }
    }
}

// DTO for creating a new short link
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateLinkDto {
    #[validate(custom(function = "validate_url"))]
    pub url: String,

    #[validate(custom(function = "validate_custom_alias"))]
    pub custom_alias: Option<String>,

    #[validate(range(min = 1, message = "expires_in_seconds must be positive"))]
    pub expires_in_seconds: Option<i64>,

    /// 0 and absent both mean unlimited
    #[validate(range(min = 0, max = 2147483647, message = "max_clicks must be non-negative"))]
    pub max_clicks: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchLinkDto {
    pub is_active: bool,
}

// DTO returned after creation
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkResponseDto {
    pub code: String,
    pub short_url: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub max_clicks: Option<i32>,
}

impl LinkResponseDto {
    pub fn from_link(link: Link, base_url: &str) -> Self {
        LinkResponseDto {
            short_url: format!("{}/{}", base_url.trim_end_matches('/'), link.code),
            code: link.code,
            long_url: link.long_url,
            created_at: link.created_at,
            expires_at: link.expires_at,
            is_active: link.is_active,
            max_clicks: link.max_clicks,
        }
    }
}

/// Owner-facing stats. `click_count` includes clicks not yet flushed.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkStatsDto {
    pub code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub max_clicks: Option<i32>,
    pub click_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl LinkStatsDto {
    pub fn from_link(link: Link, pending_clicks: i64) -> Self {
        LinkStatsDto {
            code: link.code,
            long_url: link.long_url,
            created_at: link.created_at,
            expires_at: link.expires_at,
            is_active: link.is_active,
            max_clicks: link.max_clicks,
            click_count: link.click_count + pending_clicks,
            last_accessed_at: link.last_accessed_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkListQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkListItem {
    pub code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub max_clicks: Option<i32>,
    pub click_count: i64,
}

impl From<Link> for LinkListItem {
    fn from(link: Link) -> Self {
        LinkListItem {
            code: link.code,
            long_url: link.long_url,
            created_at: link.created_at,
            expires_at: link.expires_at,
            is_active: link.is_active,
            max_clicks: link.max_clicks,
            click_count: link.click_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkListResponse {
    pub items: Vec<LinkListItem>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(url: &str) -> CreateLinkDto {
        CreateLinkDto {
            url: url.to_string(),
            custom_alias: None,
            expires_in_seconds: None,
            max_clicks: None,
        }
    }

    #[test]
    fn create_dto_rejects_non_http_urls() {
        for bad in ["example.com", "ftp://example.com", "javascript:alert(1)", "file:///etc/passwd"] {
            assert!(dto(bad).validate().is_err(), "{} should be rejected", bad);
        }
        assert!(dto("https://example.com/path?q=1").validate().is_ok());
    }

    #[test]
    fn create_dto_rejects_non_positive_expiry() {
        let mut req = dto("https://example.com");
        req.expires_in_seconds = Some(0);
        assert!(req.validate().is_err());
        req.expires_in_seconds = Some(-100);
        assert!(req.validate().is_err());
        req.expires_in_seconds = Some(1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_dto_rejects_negative_max_clicks() {
        let mut req = dto("https://example.com");
        req.max_clicks = Some(-1);
        assert!(req.validate().is_err());
        req.max_clicks = Some(0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_dto_checks_alias() {
        let mut req = dto("https://example.com");
        req.custom_alias = Some("nope!".to_string());
        assert!(req.validate().is_err());
        req.custom_alias = Some("brendan_123".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn stats_overlay_pending_clicks() {
        let link = Link {
            id: Uuid::new_v4(),
            code: "abc1234".to_string(),
            long_url: "https://example.com".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            is_active: true,
            max_clicks: None,
            click_count: 5,
            last_accessed_at: None,
            owner_api_key_id: None,
        };
        let stats = LinkStatsDto::from_link(link, 3);
        assert_eq!(stats.click_count, 8);
    }

    #[test]
    fn short_url_joins_base_without_double_slash() {
        let link = Link {
            id: Uuid::new_v4(),
            code: "abc1234".to_string(),
            long_url: "https://example.com".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            is_active: true,
            max_clicks: None,
            click_count: 0,
            last_accessed_at: None,
            owner_api_key_id: None,
        };
        let dto = LinkResponseDto::from_link(link, "http://sho.rt/");
        assert_eq!(dto.short_url, "http://sho.rt/abc1234");
    }
}
