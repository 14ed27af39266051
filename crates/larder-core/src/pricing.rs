//! # Pricing
//!
//! Discount policies and the priced quote a bill is issued from.
//!
//! ```text
//!   catalog snapshots ──► BillLine[] ──► Quote::price(lines, &dyn DiscountPolicy)
//!                                             │
//!                                             ├── subtotal = Σ line totals
//!                                             ├── discount = policy(lines)
//!                                             └── total    = subtotal − discount ≥ 0
//! ```

use serde::Serialize;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::types::BillLine;
use crate::validation::validate_percent;

// =============================================================================
// Discount Policy
// =============================================================================

/// Computes the discount for a set of priced lines.
pub trait DiscountPolicy: Send + Sync {
    fn discount_for(&self, lines: &[BillLine]) -> Money;
}

/// No discount.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscount;

impl DiscountPolicy for NoDiscount {
    fn discount_for(&self, _lines: &[BillLine]) -> Money {
        Money::zero()
    }
}

/// Flat percentage off the subtotal, rounded half-up to the cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PercentDiscount {
    percent: u8,
}

impl PercentDiscount {
    pub fn new(percent: u8) -> ValidationResult<Self> {
        validate_percent(percent)?;
        Ok(PercentDiscount { percent })
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }
}

impl DiscountPolicy for PercentDiscount {
    fn discount_for(&self, lines: &[BillLine]) -> Money {
        // Quote::price rejects an overflowing subtotal before asking
        let subtotal = lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()))
            .unwrap_or(Money::from_cents(i64::MAX));
        subtotal.percentage(self.percent)
    }
}

// =============================================================================
// Quote
// =============================================================================

/// Priced cart, before cash is tendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lines: Vec<BillLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

impl Quote {
    /// Prices `lines` under `discount`.
    ///
    /// ## Errors
    /// - `OutOfRange` when the subtotal does not fit in i64 cents
    /// - `MustNotBeNegative` when the policy returns a negative discount
    /// - `DiscountExceedsSubtotal` when the total would go below zero
    pub fn price(lines: Vec<BillLine>, discount: &dyn DiscountPolicy) -> ValidationResult<Quote> {
        let subtotal = lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()))
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "subtotal".to_string(),
                min: 0,
                max: i64::MAX,
            })?;
        // policies only see lines whose sum fits
        let discount = discount.discount_for(&lines);

        if discount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "discount".to_string(),
            });
        }
        if discount > subtotal {
            return Err(ValidationError::DiscountExceedsSubtotal {
                subtotal_cents: subtotal.cents(),
                discount_cents: discount.cents(),
            });
        }

        Ok(Quote {
            total: subtotal - discount,
            lines,
            subtotal,
            discount,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
