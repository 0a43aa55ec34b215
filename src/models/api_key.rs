use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A caller identity for the management API. Only the SHA-256 hex digest of
/// the plaintext key is ever stored.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub key_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
