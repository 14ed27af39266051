//! # Inventory Error Types
//!
//! The typed failure every use case returns.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Inventory Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │  Insufficient   │  │  ConcurrencyConflict    │ │
//! │  │                 │  │     Stock       │  │                         │ │
//! │  │  before any     │  │  policy ran out │  │  conditional decrement  │ │
//! │  │  transaction    │  │  of candidates  │  │  lost a race            │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Persistence   │  │  Configuration  │                              │
//! │  │                 │  │                 │                              │
//! │  │  any DbError    │  │  load / save /  │                              │
//! │  │                 │  │  invalid        │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  Every kind except Validation and Configuration aborts the enclosing   │
//! │  transaction: nothing the failed call wrote is ever visible.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use larder_core::{StockLocation, ValidationError};
use larder_db::DbError;

/// Result type alias for engine operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Failure of a checkout, transfer or stock operation.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Malformed input, rejected before any mutation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The selection policy exhausted its candidates.
    #[error("Insufficient stock for {product_code} at {location}: requested {requested}, available {available}")]
    InsufficientStock {
        product_code: String,
        location: StockLocation,
        requested: i64,
        available: i64,
    },

    /// A conditional decrement matched no rows.
    #[error("Concurrent update on batch {batch_id}; transaction aborted")]
    ConcurrencyConflict { batch_id: i64 },

    /// Storage failure.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

/// Discriminant of [`InventoryError`] for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InsufficientStock,
    ConcurrencyConflict,
    Persistence,
    Configuration,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for InventoryError {
    fn from(err: std::io::Error) -> Self {
        InventoryError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for InventoryError {
    fn from(err: toml::de::Error) -> Self {
        InventoryError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for InventoryError {
    fn from(err: toml::ser::Error) -> Self {
        InventoryError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Validation(_) => ErrorKind::Validation,
            InventoryError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            InventoryError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            InventoryError::Persistence(_) => ErrorKind::Persistence,
            InventoryError::InvalidConfig(_)
            | InventoryError::ConfigLoadFailed(_)
            | InventoryError::ConfigSaveFailed(_) => ErrorKind::Configuration,
        }
    }

    /// Returns true if running the same operation again may succeed.
    ///
    /// ## Retryable Errors
    /// - Lost optimistic races (stock may remain in other batches)
    /// - Lock waits past busy_timeout, pool exhaustion
    ///
    /// ## Non-Retryable Errors
    /// - Validation, insufficient stock, configuration
    /// - Constraint violations and other storage faults
    ///
    /// The engine never retries by itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            InventoryError::ConcurrencyConflict { .. } => true,
            InventoryError::Persistence(db) => db.is_contention(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
