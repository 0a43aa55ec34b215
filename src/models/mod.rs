mod api_key;
mod click;
mod link;
mod policy;
mod rate_limit;

pub use api_key::ApiKey;
pub use click::PendingClicks;
pub use link::{
    CreateLinkDto, Link, LinkListItem, LinkListQuery, LinkListResponse, LinkResponseDto,
    LinkSnapshot, LinkStatsDto, NewLink, PatchLinkDto,
};
pub use policy::{Decision, DenyReason};
pub use rate_limit::{FixedWindowResult, RateLimitInfo, TokenBucketResult};
