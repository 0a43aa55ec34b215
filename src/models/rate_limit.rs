use serde::Serialize;

/// Outcome of a fixed-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindowResult {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_seconds: u64,
}

/// Outcome of a token-bucket check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucketResult {
    pub allowed: bool,
    pub remaining: u64,
    pub retry_after: u64,
}

/// What a throttled caller is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    pub retry_after: u64,
}
