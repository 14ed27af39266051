//! # Sequence Generator
//!
//! Bill serials per named scope, allocated under the enclosing transaction's
//! write lock.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE sequence_counter SET next_value = next_value + 1                │
//! │  WHERE scope = ?1                                                       │
//! │  RETURNING next_value - 1                                               │
//! │                                                                         │
//! │  • read + advance are one statement                                     │
//! │  • the write takes SQLite's write lock, held until commit / rollback    │
//! │  • a second allocator waits (busy_timeout) until the first finishes     │
//! │  • a rolled-back checkout also rolls back its advance                   │
//! │                                                                         │
//! │  COUNTER ─► C-000001, C-000002, ...      WEB ─► W-000001, ...           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use larder_core::SERIAL_DIGITS;

/// Formats a serial: first letter of the scope upper-cased, a dash, then the
/// counter value zero-padded.
///
/// ```rust
/// use larder_db::format_serial;
///
/// assert_eq!(format_serial("COUNTER", 1), "C-000001");
/// assert_eq!(format_serial("web", 42), "W-000042");
/// ```
pub fn format_serial(scope: &str, value: i64) -> String {
    let prefix = scope
        .trim()
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('X');
    format!("{}-{:0width$}", prefix, value, width = SERIAL_DIGITS)
}

/// Serial allocation bound to one transaction's connection.
pub struct SequenceGenerator<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SequenceGenerator<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SequenceGenerator { conn }
    }

    /// Allocates the next serial for `scope`.
    ///
    /// ## Errors
    /// - `NotFound` when the scope has no counter row
    /// - `Busy` when another transaction held the lock past busy_timeout
    pub async fn next(&mut self, scope: &str) -> DbResult<String> {
        let value = self.next_value(scope).await?;
        let serial = format_serial(scope, value);

        debug!(scope, value, serial = %serial, "Serial allocated");
        Ok(serial)
    }

    /// Advances the counter and returns the value it held.
    pub async fn next_value(&mut self, scope: &str) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE sequence_counter
            SET next_value = next_value + 1
            WHERE scope = ?1
            RETURNING next_value - 1
            "#,
        )
        .bind(scope)
        .fetch_optional(&mut *self.conn)
        .await?;

        value.ok_or_else(|| DbError::not_found("SequenceCounter", scope))
    }

    /// Reads the value the next allocation will use, without advancing.
    pub async fn peek(&mut self, scope: &str) -> DbResult<i64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT next_value FROM sequence_counter WHERE scope = ?1")
                .bind(scope)
                .fetch_optional(&mut *self.conn)
                .await?;

        value.ok_or_else(|| DbError::not_found("SequenceCounter", scope))
    }

    /// Creates a counter for a new scope starting at 1. No-op if it exists.
    pub async fn seed(&mut self, scope: &str) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO sequence_counter (scope, next_value) VALUES (?1, 1)")
            .bind(scope)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
