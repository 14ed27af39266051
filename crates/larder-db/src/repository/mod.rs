//! # Repository Module
//!
//! Database repository implementations for Larder.
//!
//! ## Two Kinds of Repository
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Transaction-bound (borrow a UnitOfWork's connection)                   │
//! │  ├── StockLedger        batch reads, conditional decrements, transfer   │
//! │  ├── SequenceGenerator  locked serial allocation                        │
//! │  ├── BillRepository     bill + lines                                    │
//! │  └── MovementLog        append-only audit                               │
//! │                                                                         │
//! │  Pool-level (own short transactions)                                    │
//! │  └── ShortageRepository notices that must outlive a rollback            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A transaction-bound repository cannot outlive its unit of work: the
//! borrow checker enforces that every read and write belongs to exactly one
//! transaction.

pub mod batch;
pub mod bill;
pub mod movement;
pub mod sequence;
pub mod shortage;
