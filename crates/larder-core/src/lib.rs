//! # larder-core: Pure Business Logic for Larder
//!
//! Domain types and rules for batch-level, lot-tracked inventory. Nothing in
//! this crate touches a database, a clock used for decisions, or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 larder-engine (use cases)                       │   │
//! │  │    CheckoutService ──► TransferService ──► StockService         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ larder-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  policy   │  │ validation│  │   │
//! │  │   │   Batch   │  │   Money   │  │ FEFO/FIFO │  │   rules   │  │   │
//! │  │   │   Bill    │  │           │  │  planner  │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  larder-db (Database Layer)                     │   │
//! │  │           SQLite ledger, sequences, bills, movements            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Batch, Bill, StockLocation, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`policy`] - Batch ordering and greedy deduction planning
//! - [`pricing`] - Discount policies and quotes
//! - [`error`] - Validation error type
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use larder_core::money::Money;
//!
//! let unit = Money::from_cents(250);
//! let line = unit.checked_multiply_quantity(4);
//! assert_eq!(line, Some(Money::from_cents(1000)));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod policy;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ValidationError, ValidationResult};
pub use money::Money;
pub use policy::{BatchTake, DeductionPlan, SelectionPolicy};
pub use pricing::{DiscountPolicy, NoDiscount, PercentDiscount, Quote};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Sequence scope used by the cash counter.
pub const DEFAULT_SCOPE: &str = "COUNTER";

/// SHELF quantity below which a checkout announces low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 50;

/// Largest quantity accepted for one cart line, receipt or transfer.
///
/// Keeps `unit price × quantity` well inside i64 cents and catches typos
/// like 100000 for 10.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Width of the zero-padded numeric part of a bill serial.
pub const SERIAL_DIGITS: usize = 6;
