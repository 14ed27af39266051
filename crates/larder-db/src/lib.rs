//! # larder-db: Database Layer for Larder
//!
//! SQLite storage for the batch ledger, serial counters, bills, movements and
//! the shortage log, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Data Flow                                 │
//! │                                                                         │
//! │  CheckoutService / TransferService (larder-engine)                     │
//! │       │  db.begin()                                                     │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    larder-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  UnitOfWork   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│  one SQLite   │    │  (embedded)  │  │   │
//! │  │   │               │    │  transaction  │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │ borrows                       │   │
//! │  │        ┌───────────┬───────────┼───────────┬───────────┐      │   │
//! │  │        ▼           ▼           ▼           ▼           │      │   │
//! │  │   StockLedger  Sequence   BillRepository MovementLog    │      │   │
//! │  │                Generator                                │      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys, busy_timeout)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`unit_of_work`] - Scoped transaction with guaranteed rollback
//! - [`error`] - Database error types
//! - [`repository`] - Ledger, sequences, bills, movements, shortages
//!
//! ## Usage
//!
//! ```rust,ignore
//! use larder_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("larder.db")).await?;
//!
//! let mut uow = db.begin().await?;
//! let serial = uow.sequences().next("COUNTER").await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::batch::{DeductOutcome, MovedChunk, StockLedger, TransferOutcome};
pub use repository::bill::BillRepository;
pub use repository::movement::{MovementLog, NewMovement};
pub use repository::sequence::{format_serial, SequenceGenerator};
pub use repository::shortage::ShortageRepository;
