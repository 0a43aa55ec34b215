use std::fmt;

use serde::Serialize;

/// Why a link may not be followed. Checks run in declaration order and the
/// first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    Disabled,
    Expired,
    QuotaExceeded,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Disabled => "DISABLED",
            DenyReason::Expired => "EXPIRED",
            DenyReason::QuotaExceeded => "QUOTA_EXCEEDED",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Disabled => write!(f, "Link is disabled"),
            DenyReason::Expired => write!(f, "Link is expired"),
            DenyReason::QuotaExceeded => write!(f, "Max clicks exceeded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}
