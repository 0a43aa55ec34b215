// src/repositories/link.rs - Data access
use async_trait::async_trait;
use log::debug;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::{Link, NewLink, PendingClicks};
use crate::utils::cursor::ListCursor;

type Result<T> = std::result::Result<T, RepositoryError>;

const LINK_COLUMNS: &str = "id, code, long_url, created_at, expires_at, is_active, max_clicks, \
                            click_count, last_accessed_at, owner_api_key_id";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepositoryTrait: Send + Sync {
    /// Finds a link by its short code, regardless of owner
    ///
    /// ### Errors
    /// * `RepositoryError::Database` - If a database error occurs
    async fn find_by_code(&self, code: &str) -> Result<Option<Link>>;

    /// Finds a link by code only if `owner` created it
    ///
    /// ### Returns
    /// * `Result<Option<Link>>` - `None` both when the code is unknown and when
    ///   another identity owns it
    async fn find_owned(&self, code: &str, owner: Uuid) -> Result<Option<Link>>;

    /// Inserts a new link
    ///
    /// ### Errors
    /// * `RepositoryError::Conflict` - If the code is already taken
    /// * `RepositoryError::Database` - If a database error occurs
    async fn insert(&self, link: &NewLink) -> Result<Link>;

    /// Sets `is_active` on an owned link and returns the updated row
    async fn update_active(&self, code: &str, owner: Uuid, is_active: bool)
        -> Result<Option<Link>>;

    /// Adds each delta to `click_count` and moves `last_accessed_at` forward
    /// when a timestamp is present, all inside one transaction
    ///
    /// ### Returns
    /// * `Result<u64>` - number of rows touched (deleted links are skipped)
    async fn apply_click_deltas(&self, batch: &[PendingClicks]) -> Result<u64>;

    /// Owner's links, newest first, strictly after `cursor` when given
    async fn list_owned(
        &self,
        owner: Uuid,
        limit: i64,
        cursor: Option<ListCursor>,
    ) -> Result<Vec<Link>>;
}

// Implementation using actual database
pub struct LinkRepository {
    pool: PgPool,
}

impl LinkRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    // Helper method for transactions
    async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            log::error!("Failed to start database transaction: {}", e);
            RepositoryError::Database(e)
        })
    }
}

#[async_trait]
impl LinkRepositoryTrait for LinkRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Link>> {
        let sql = format!("SELECT {} FROM links WHERE code = $1", LINK_COLUMNS);
        sqlx::query_as::<_, Link>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn find_owned(&self, code: &str, owner: Uuid) -> Result<Option<Link>> {
        let sql = format!(
            "SELECT {} FROM links WHERE code = $1 AND owner_api_key_id = $2",
            LINK_COLUMNS
        );
        sqlx::query_as::<_, Link>(&sql)
            .bind(code)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn insert(&self, link: &NewLink) -> Result<Link> {
        let sql = format!(
            r#"
            INSERT INTO links (id, code, long_url, created_at, expires_at, max_clicks, owner_api_key_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            LINK_COLUMNS
        );

        sqlx::query_as::<_, Link>(&sql)
            .bind(Uuid::new_v4())
            .bind(&link.code)
            .bind(&link.long_url)
            .bind(link.created_at)
            .bind(link.expires_at)
            .bind(link.max_clicks)
            .bind(link.owner_api_key_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let err = RepositoryError::from(e);
                // Collisions are expected for generated codes; the caller decides
                if !matches!(err, RepositoryError::Conflict(_)) {
                    log::error!("Failed to insert link: {}", err);
                }
                err
            })
    }

    async fn update_active(
        &self,
        code: &str,
        owner: Uuid,
        is_active: bool,
    ) -> Result<Option<Link>> {
        debug!("Setting is_active={} on link {}", is_active, code);

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE links SET is_active = ");
        builder.push_bind(is_active);
        builder.push(" WHERE code = ").push_bind(code);
        builder.push(" AND owner_api_key_id = ").push_bind(owner);
        builder.push(" RETURNING ").push(LINK_COLUMNS);

        builder
            .build_query_as::<Link>()
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn apply_click_deltas(&self, batch: &[PendingClicks]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.begin_transaction().await?;
        let mut touched = 0;

        for pending in batch {
            let result = sqlx::query(
                r#"
                UPDATE links
                SET click_count = click_count + $2,
                    last_accessed_at = COALESCE($3, last_accessed_at)
                WHERE code = $1
                "#,
            )
            .bind(&pending.code)
            .bind(pending.delta)
            .bind(pending.last_accessed_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!("Dropping {} clicks for missing link {}", pending.delta, pending.code);
            }
            touched += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            log::error!("Failed to commit click flush: {}", e);
            RepositoryError::Database(e)
        })?;

        Ok(touched)
    }

    async fn list_owned(
        &self,
        owner: Uuid,
        limit: i64,
        cursor: Option<ListCursor>,
    ) -> Result<Vec<Link>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(LINK_COLUMNS);
        builder.push(" FROM links WHERE owner_api_key_id = ");
        builder.push_bind(owner);

        if let Some(cursor) = cursor {
            builder.push(" AND (created_at < ");
            builder.push_bind(cursor.created_at);
            builder.push(" OR (created_at = ");
            builder.push_bind(cursor.created_at);
            builder.push(" AND id < ");
            builder.push_bind(cursor.id);
            builder.push("))");
        }

        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);

        let results = builder
            .build_query_as::<Link>()
            .fetch_all(&self.pool)
            .await?;

        Ok(results)
    }
}
