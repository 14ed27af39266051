//! # Unit of Work
//!
//! One SQLite transaction, threaded explicitly through every call that must
//! be atomic.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  db.begin() ──► UnitOfWork ──┬── ledger()      ─┐                      │
//! │                              ├── sequences()   ─┤  each borrows the    │
//! │                              ├── bills()       ─┤  transaction's       │
//! │                              └── movements()   ─┘  connection          │
//! │                                   │                                     │
//! │             ┌─────────────────────┼─────────────────────┐               │
//! │             ▼                     ▼                     ▼               │
//! │        commit(self)         rollback(self)        dropped (any          │
//! │        all writes           nothing               early return, `?`,    │
//! │        visible              visible               panic) → rollback     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Read vs Write
//! `db.begin()` opens a deferred transaction: SQLite takes the write lock
//! at the first write. A deferred transaction that reads before it writes
//! fails with SQLITE_BUSY_SNAPSHOT if another writer committed in between,
//! and busy_timeout does not help. `db.begin_write()` issues
//! `BEGIN IMMEDIATE`, so the write lock is taken up front and competing
//! writers queue on busy_timeout instead.
//!
//! `commit` and `rollback` consume the value, so a finished unit of work
//! cannot be used again. Dropping an unfinished one rolls it back: the
//! underlying `sqlx::Transaction` issues the ROLLBACK before its connection
//! goes back to the pool.

use sqlx::{Sqlite, SqlitePool, Transaction};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::batch::StockLedger;
use crate::repository::bill::BillRepository;
use crate::repository::movement::MovementLog;
use crate::repository::sequence::SequenceGenerator;

/// A scoped database transaction.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    started: Instant,
}

impl UnitOfWork {
    /// Begins a deferred transaction on a connection from `pool`.
    pub(crate) async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool.begin().await.map_err(transaction_error)?;

        debug!("Transaction started");

        Ok(UnitOfWork {
            tx,
            started: Instant::now(),
        })
    }

    /// Begins a transaction holding SQLite's write lock from the start.
    pub(crate) async fn begin_immediate(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(transaction_error)?;

        debug!("Write transaction started");

        Ok(UnitOfWork {
            tx,
            started: Instant::now(),
        })
    }

    /// Batch ledger bound to this transaction.
    pub fn ledger(&mut self) -> StockLedger<'_> {
        StockLedger::new(&mut self.tx)
    }

    /// Serial counters bound to this transaction.
    pub fn sequences(&mut self) -> SequenceGenerator<'_> {
        SequenceGenerator::new(&mut self.tx)
    }

    /// Bill storage bound to this transaction.
    pub fn bills(&mut self) -> BillRepository<'_> {
        BillRepository::new(&mut self.tx)
    }

    /// Movement audit log bound to this transaction.
    pub fn movements(&mut self) -> MovementLog<'_> {
        MovementLog::new(&mut self.tx)
    }

    /// Makes every write in this unit of work visible.
    pub async fn commit(self) -> DbResult<()> {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;

        self.tx.commit().await.map_err(transaction_error)?;

        debug!(elapsed_ms, "Transaction committed");
        Ok(())
    }

    /// Discards every write in this unit of work.
    pub async fn rollback(self) -> DbResult<()> {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;

        if let Err(e) = self.tx.rollback().await {
            warn!(elapsed_ms, error = %e, "Rollback failed");
            return Err(DbError::TransactionFailed(e.to_string()));
        }

        debug!(elapsed_ms, "Transaction rolled back");
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

fn transaction_error(err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        DbError::Internal(msg) => DbError::TransactionFailed(msg),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
