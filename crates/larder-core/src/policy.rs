//! # Batch Selection Policy
//!
//! Decides which batches a deduction consumes, and in what order.
//!
//! ## One Algorithm, Two Orderings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  candidates (quantity > 0)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SelectionPolicy::order()                                               │
//! │    EarliestExpiryFirst: expiry ASC (none last), received_at, id         │
//! │    FirstInFirstOut:     received_at, id                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  greedy walk: take min(remaining, batch.quantity) until remaining = 0   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DeductionPlan { takes, shortfall }                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan is pure. Applying it (conditional decrements inside a
//! transaction) is the ledger's job.
//!
//! ## Example
//! ```rust
//! use chrono::{NaiveDate, TimeZone, Utc};
//! use larder_core::{Batch, SelectionPolicy, StockLocation};
//!
//! let batch = |id, expiry, qty| Batch {
//!     id,
//!     product_code: "CLN003".into(),
//!     location: StockLocation::Shelf,
//!     received_at: Utc.with_ymd_and_hms(2024, 1, id as u32, 0, 0, 0).unwrap(),
//!     expiry,
//!     quantity: qty,
//!     version: 0,
//! };
//! let batches = vec![batch(2, None, 5), batch(1, NaiveDate::from_ymd_opt(2025, 1, 1), 10)];
//!
//! let plan = SelectionPolicy::EarliestExpiryFirst.plan(&batches, 12);
//! assert_eq!(plan.takes[0].batch_id, 1);
//! assert_eq!(plan.takes[0].quantity, 10);
//! assert_eq!(plan.takes[1].quantity, 2);
//! assert!(plan.is_complete());
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::Batch;

// =============================================================================
// Selection Policy
// =============================================================================

/// Batch consumption order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Soonest-to-expire first, batches without expiry last.
    #[default]
    EarliestExpiryFirst,
    /// Oldest-received first, expiry ignored.
    #[serde(rename = "fifo", alias = "first_in_first_out")]
    FirstInFirstOut,
}

impl SelectionPolicy {
    /// Compares two batches under this policy.
    ///
    /// The batch id is the final tie-break so the order is total and
    /// deterministic.
    pub fn compare(&self, a: &Batch, b: &Batch) -> Ordering {
        match self {
            SelectionPolicy::EarliestExpiryFirst => compare_expiry(a.expiry, b.expiry)
                .then(a.received_at.cmp(&b.received_at))
                .then(a.id.cmp(&b.id)),
            SelectionPolicy::FirstInFirstOut => a
                .received_at
                .cmp(&b.received_at)
                .then(a.id.cmp(&b.id)),
        }
    }

    /// Sorts candidates in consumption order.
    pub fn order(&self, batches: &mut [Batch]) {
        batches.sort_by(|a, b| self.compare(a, b));
    }

    /// Plans a greedy deduction of `requested` units over `candidates`.
    ///
    /// Candidates are ordered by this policy first. Empty batches are
    /// skipped. The plan consumes the fewest batches needed in that order;
    /// `shortfall` is what the candidates could not cover.
    pub fn plan(&self, candidates: &[Batch], requested: i64) -> DeductionPlan {
        let mut ordered: Vec<&Batch> = candidates.iter().filter(|b| b.quantity > 0).collect();
        ordered.sort_by(|a, b| self.compare(a, b));

        let mut remaining = requested.max(0);
        let mut takes = Vec::new();

        for batch in ordered {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.quantity);
            takes.push(BatchTake {
                batch_id: batch.id,
                expiry: batch.expiry,
                quantity: take,
            });
            remaining -= take;
        }

        DeductionPlan {
            takes,
            requested,
            shortfall: remaining,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::EarliestExpiryFirst => "earliest_expiry_first",
            SelectionPolicy::FirstInFirstOut => "fifo",
        }
    }
}

/// Expiry ordering with missing dates sorted last.
fn compare_expiry(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "earliest_expiry_first" | "fefo" => Ok(SelectionPolicy::EarliestExpiryFirst),
            "first_in_first_out" | "fifo" => Ok(SelectionPolicy::FirstInFirstOut),
            _ => Err(ValidationError::InvalidFormat {
                field: "selection policy".to_string(),
                reason: format!("'{}' is not fefo or fifo", s),
            }),
        }
    }
}

// =============================================================================
// Deduction Plan
// =============================================================================

/// One planned decrement against one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchTake {
    pub batch_id: i64,
    pub expiry: Option<NaiveDate>,
    pub quantity: i64,
}

/// Result of planning a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeductionPlan {
    pub takes: Vec<BatchTake>,
    pub requested: i64,
    pub shortfall: i64,
}

impl DeductionPlan {
    /// True when the plan covers the full request.
    pub fn is_complete(&self) -> bool {
        self.shortfall == 0
    }

    /// Units the plan takes in total.
    pub fn planned(&self) -> i64 {
        self.requested - self.shortfall
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
