//! # Shortage Repository
//!
//! Manager-visible shortage notices.
//!
//! Unlike the transaction-bound repositories, this one works on the pool:
//! a shortage is recorded after the failed checkout has rolled back, so the
//! notice must survive that rollback.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use larder_core::ShortageNotice;

/// Repository for the `notify_shortage` table.
#[derive(Debug, Clone)]
pub struct ShortageRepository {
    pool: SqlitePool,
}

impl ShortageRepository {
    /// Creates a new ShortageRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShortageRepository { pool }
    }

    /// Stores a notice and returns its id.
    pub async fn record(&self, message: &str) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO notify_shortage (message, created_at) VALUES (?1, ?2) RETURNING id",
        )
        .bind(message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(notice_id = id, "Shortage notice stored");
        Ok(id)
    }

    /// All notices, newest first.
    pub async fn list(&self) -> DbResult<Vec<ShortageNotice>> {
        let notices = sqlx::query_as::<_, ShortageNotice>(
            r#"
            SELECT id, message, created_at
            FROM notify_shortage
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(notices)
    }

    /// Deletes every notice; returns how many were removed.
    pub async fn clear(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM notify_shortage")
            .execute(&self.pool)
            .await?;

        info!(removed = result.rows_affected(), "Shortage notices cleared");
        Ok(result.rows_affected())
    }
}
