// src/repositories/api_key.rs - API key lookup
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::ApiKey;

type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiKeyRepositoryTrait: Send + Sync {
    /// Finds the key whose stored hash matches `key_hash`
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;

    /// Stores a new key hash under a display name
    async fn insert(&self, name: &str, key_hash: &str) -> Result<ApiKey>;
}

pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl ApiKeyRepositoryTrait for ApiKeyRepository {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, key_hash, name, created_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn insert(&self, name: &str, key_hash: &str) -> Result<ApiKey> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (id, key_hash, name)
            VALUES ($1, $2, $3)
            RETURNING id, key_hash, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key_hash)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            log::error!("Failed to insert API key: {}", e);
            RepositoryError::from(e)
        })
    }
}
