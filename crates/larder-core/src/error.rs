//! # Error Types
//!
//! Validation errors for larder-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  larder-core (this file)                                               │
//! │  └── ValidationError  - malformed input, detected before any mutation  │
//! │                                                                         │
//! │  larder-db                                                             │
//! │  └── DbError          - storage failures                               │
//! │                                                                         │
//! │  larder-engine                                                         │
//! │  └── InventoryError   - Validation | InsufficientStock |               │
//! │                         ConcurrencyConflict | Persistence              │
//! │                                                                         │
//! │  Flow: ValidationError ─┐                                              │
//! │        DbError ─────────┼──► InventoryError ──► caller                 │
//! │        ledger outcomes ─┘                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::StockLocation;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Every variant is raised before a transaction is opened or, for bill
/// arithmetic, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. illegal characters in a product code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Product code is not known to the catalog.
    #[error("Unknown product: {code}")]
    UnknownProduct { code: String },

    /// Source and destination of a movement are the same location.
    #[error("Source and destination must differ (both {location})")]
    SameLocation { location: StockLocation },

    /// Discount policy produced more than the subtotal.
    #[error("Discount {discount_cents} exceeds subtotal {subtotal_cents}")]
    DiscountExceedsSubtotal {
        subtotal_cents: i64,
        discount_cents: i64,
    },

    /// Cash tendered does not cover the bill total.
    #[error("Cash {cash_cents} is less than total {total_cents}")]
    InsufficientCash { total_cents: i64, cash_cents: i64 },

    /// Expiry date lies in the past.
    #[error("Expiry date {expiry} is in the past")]
    ExpiredOnArrival { expiry: chrono::NaiveDate },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================
