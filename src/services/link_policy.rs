// src/services/link_policy.rs - Redirect eligibility
use chrono::{DateTime, Utc};

use crate::models::{Decision, DenyReason, LinkSnapshot};

/// Decides whether a link may be followed right now.
///
/// `effective_click_count` must already include buffered clicks. Checks run
/// disabled, then expired, then quota; the first failing one wins. A quota of
/// `None` or `Some(0)` is unlimited.
pub fn evaluate(
    snapshot: &LinkSnapshot,
    effective_click_count: i64,
    now: DateTime<Utc>,
) -> Decision {
    if !snapshot.is_active {
        return Decision::Denied(DenyReason::Disabled);
    }

    if let Some(expires_at) = snapshot.expires_at {
        if now >= expires_at {
            return Decision::Denied(DenyReason::Expired);
        }
    }

    if let Some(max_clicks) = snapshot.max_clicks.filter(|n| *n > 0) {
        if effective_click_count >= i64::from(max_clicks) {
            return Decision::Denied(DenyReason::QuotaExceeded);
        }
    }

    Decision::Allowed
}
