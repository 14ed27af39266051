//! # Domain Types
//!
//! Core domain types used throughout Larder.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Batch       │   │      Bill       │   │   BillLine      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  serial         │   │  product_code   │       │
//! │  │  product_code   │   │  created_at     │   │  name snapshot  │       │
//! │  │  location       │   │  lines          │   │  quantity       │       │
//! │  │  received_at    │   │  subtotal       │   │  unit price     │       │
//! │  │  expiry?        │   │  discount/total │   │  line total     │       │
//! │  │  quantity ≥ 0   │   │  cash/change    │   └─────────────────┘       │
//! │  │  version        │   └─────────────────┘                              │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ StockLocation   │   │InventoryMovement│   │ LowStockEvent   │       │
//! │  │  MAIN_STORE     │   │  append-only    │   │  product_code   │       │
//! │  │  SHELF          │   │  audit record   │   │  remaining      │       │
//! │  │  WEB            │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::pricing::Quote;

// =============================================================================
// Stock Location
// =============================================================================

/// A place where stock is held.
///
/// SHELF is the primary retail location, WEB the secondary online location
/// that backs SHELF shortfalls at checkout, MAIN_STORE the back store that
/// receives supplier deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockLocation {
    MainStore,
    Shelf,
    Web,
}

impl StockLocation {
    /// Every location, in a stable order.
    pub const ALL: [StockLocation; 3] = [
        StockLocation::MainStore,
        StockLocation::Shelf,
        StockLocation::Web,
    ];

    /// The stored / wire name of the location.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockLocation::MainStore => "MAIN_STORE",
            StockLocation::Shelf => "SHELF",
            StockLocation::Web => "WEB",
        }
    }
}

impl fmt::Display for StockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockLocation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "MAIN_STORE" | "MAIN" => Ok(StockLocation::MainStore),
            "SHELF" => Ok(StockLocation::Shelf),
            "WEB" => Ok(StockLocation::Web),
            _ => Err(ValidationError::InvalidFormat {
                field: "location".to_string(),
                reason: format!("'{}' is not one of MAIN_STORE, SHELF, WEB", s),
            }),
        }
    }
}

// =============================================================================
// Batch
// =============================================================================

/// A quantity of one product received at one time into one location.
///
/// `quantity` never goes below zero; the storage layer enforces it with a
/// CHECK constraint and a conditional decrement. `version` increases on every
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batch {
    pub id: i64,
    pub product_code: String,
    pub location: StockLocation,
    pub received_at: DateTime<Utc>,
    pub expiry: Option<NaiveDate>,
    pub quantity: i64,
    pub version: i64,
}

impl Batch {
    /// True when the batch carries an expiry on or before `today`.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= today)
    }
}

/// A batch about to be received (no identity yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatch {
    pub product_code: String,
    pub location: StockLocation,
    pub received_at: DateTime<Utc>,
    pub expiry: Option<NaiveDate>,
    pub quantity: i64,
}

// =============================================================================
// Cart
// =============================================================================

/// One requested (product, quantity) pair submitted to checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_code: String,
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_code: impl Into<String>, quantity: i64) -> Self {
        CartItem {
            product_code: product_code.into(),
            quantity,
        }
    }
}

// =============================================================================
// Bill Line
// =============================================================================

/// A priced line on a bill.
///
/// Name and unit price are snapshots taken from the catalog at sale time so
/// historical bills do not move when the catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillLine {
    product_code: String,
    name: String,
    quantity: i64,
    unit_price: Money,
    line_total: Money,
}

impl BillLine {
    /// Prices a line.
    ///
    /// ## Errors
    /// - `OutOfRange` when `unit_price × quantity` does not fit in i64 cents
    pub fn new(
        product_code: impl Into<String>,
        name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> ValidationResult<Self> {
        let line_total = unit_price
            .checked_multiply_quantity(quantity)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "line total".to_string(),
                min: 0,
                max: i64::MAX,
            })?;

        Ok(BillLine {
            product_code: product_code.into(),
            name: name.into(),
            quantity,
            unit_price,
            line_total,
        })
    }

    /// Rebuilds a stored line without recomputing its total.
    pub fn restore(
        product_code: String,
        name: String,
        quantity: i64,
        unit_price: Money,
        line_total: Money,
    ) -> Self {
        BillLine {
            product_code,
            name,
            quantity,
            unit_price,
            line_total,
        }
    }

    pub fn product_code(&self) -> &str {
        &self.product_code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }
}

// =============================================================================
// Bill
// =============================================================================

/// An issued bill. Immutable once built.
///
/// ## Invariants
/// - `total = subtotal − discount ≥ 0`
/// - `change = cash − total ≥ 0`
/// - `subtotal = Σ line totals`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bill {
    id: Option<i64>,
    serial: String,
    created_at: DateTime<Utc>,
    lines: Vec<BillLine>,
    subtotal: Money,
    discount: Money,
    total: Money,
    cash: Money,
    change: Money,
}

impl Bill {
    /// Issues a bill from a priced quote and the cash tendered.
    ///
    /// ## Errors
    /// - `Required` when the serial is blank
    /// - `MustNotBeNegative` when cash is negative
    /// - `InsufficientCash` when cash does not cover the quote total
    pub fn issue(
        serial: impl Into<String>,
        created_at: DateTime<Utc>,
        quote: Quote,
        cash: Money,
    ) -> ValidationResult<Bill> {
        let serial = serial.into();
        if serial.trim().is_empty() {
            return Err(ValidationError::required("serial"));
        }
        if cash.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "cash".to_string(),
            });
        }
        if cash < quote.total {
            return Err(ValidationError::InsufficientCash {
                total_cents: quote.total.cents(),
                cash_cents: cash.cents(),
            });
        }

        Ok(Bill {
            id: None,
            serial,
            created_at,
            change: cash - quote.total,
            subtotal: quote.subtotal,
            discount: quote.discount,
            total: quote.total,
            lines: quote.lines,
            cash,
        })
    }

    /// Rebuilds a bill from stored columns. Values were validated when the
    /// bill was issued and are taken as-is.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: i64,
        serial: String,
        created_at: DateTime<Utc>,
        lines: Vec<BillLine>,
        subtotal: Money,
        discount: Money,
        total: Money,
        cash: Money,
        change: Money,
    ) -> Bill {
        Bill {
            id: Some(id),
            serial,
            created_at,
            lines,
            subtotal,
            discount,
            total,
            cash,
            change,
        }
    }

    /// Returns the same bill carrying its storage identity.
    pub fn with_id(self, id: i64) -> Bill {
        Bill {
            id: Some(id),
            ..self
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn lines(&self) -> &[BillLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn cash(&self) -> Money {
        self.cash
    }

    pub fn change(&self) -> Money {
        self.change
    }
}

// =============================================================================
// Inventory Movement
// =============================================================================

/// Append-only audit record of stock moved between locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryMovement {
    pub id: i64,
    pub product_code: String,
    pub from_location: StockLocation,
    pub to_location: StockLocation,
    pub quantity: i64,
    pub note: String,
    pub movement_time: DateTime<Utc>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Emitted after a checkout leaves SHELF stock below the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEvent {
    pub product_code: String,
    pub location: StockLocation,
    pub remaining: i64,
    pub threshold: i64,
}

/// A manager-visible shortage message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ShortageNotice {
    pub id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
