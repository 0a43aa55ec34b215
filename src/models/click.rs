use chrono::{DateTime, Utc};

/// Clicks drained from the buffer for one code, ready to be applied to the
/// durable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClicks {
    pub code: String,
    pub delta: i64,
    /// `None` leaves the durable `last_accessed_at` untouched.
    pub last_accessed_at: Option<DateTime<Utc>>,
}
