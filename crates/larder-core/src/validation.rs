//! # Validation Module
//!
//! Input validation for checkout, transfer and receiving.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Use case (larder-engine)                                     │
//! │  ├── THIS MODULE: checked before a transaction is opened               │
//! │  └── Catalog lookup (unknown product)                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Bill construction (types::Bill::issue)                       │
//! │  └── total ≥ 0, cash ≥ total                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── UNIQUE (serial)                                                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use larder_core::validation::{validate_product_code, validate_quantity};
//!
//! validate_product_code("CLN003").unwrap();
//! validate_quantity(12).unwrap();
//! ```

use chrono::NaiveDate;

use crate::error::{ValidationError, ValidationResult};
use crate::types::{CartItem, StockLocation};
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Longest accepted product code.
pub const MAX_PRODUCT_CODE_LEN: usize = 50;

/// Longest accepted sequence scope name.
pub const MAX_SCOPE_LEN: usize = 32;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be blank
/// - At most 50 characters
/// - Only letters, digits, hyphens and underscores
///
/// ## Example
/// ```rust
/// use larder_core::validation::validate_product_code;
///
/// assert!(validate_product_code("CLN003").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("has space").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("product code"));
    }

    if code.len() > MAX_PRODUCT_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "product code".to_string(),
            max: MAX_PRODUCT_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "product code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a sequence scope name.
///
/// A blank scope is rejected here, before any transaction is opened.
pub fn validate_scope(scope: &str) -> ValidationResult<()> {
    let scope = scope.trim();

    if scope.is_empty() {
        return Err(ValidationError::required("scope"));
    }

    if scope.len() > MAX_SCOPE_LEN {
        return Err(ValidationError::TooLong {
            field: "scope".to_string(),
            max: MAX_SCOPE_LEN,
        });
    }

    if !scope.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "scope".to_string(),
            reason: "must contain only ASCII letters, numbers, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a requested quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates cash tendered in cents. Zero is allowed (free carts).
pub fn validate_cash_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "cash".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit price in cents.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a percentage discount.
pub fn validate_percent(percent: u8) -> ValidationResult<()> {
    if percent > 100 {
        return Err(ValidationError::OutOfRange {
            field: "discount percent".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a cart before checkout.
///
/// ## Rules
/// - At least one line, at most `MAX_CART_LINES`
/// - Every product code well-formed
/// - Every quantity in `1..=MAX_ITEM_QUANTITY`
///
/// Catalog existence is checked by the checkout itself.
pub fn validate_cart(items: &[CartItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::required("cart"));
    }

    if items.len() > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }

    for item in items {
        validate_product_code(&item.product_code)?;
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

/// Validates the endpoints of a transfer.
pub fn validate_route(from: StockLocation, to: StockLocation) -> ValidationResult<()> {
    if from == to {
        return Err(ValidationError::SameLocation { location: from });
    }

    Ok(())
}

/// Validates the expiry of incoming stock against today's date.
///
/// Stock expiring today is still accepted.
pub fn validate_expiry(expiry: Option<NaiveDate>, today: NaiveDate) -> ValidationResult<()> {
    match expiry {
        Some(expiry) if expiry < today => Err(ValidationError::ExpiredOnArrival { expiry }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("CLN003").is_ok());
        assert!(validate_product_code("MILK-1L").is_ok());
        assert!(validate_product_code("bread_white").is_ok());

        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("   ").is_err());
        assert!(validate_product_code("has space").is_err());
        assert!(validate_product_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_scope() {
        assert!(validate_scope("COUNTER").is_ok());
        assert!(validate_scope("WEB").is_ok());

        assert_eq!(validate_scope(" "), Err(ValidationError::required("scope")));
        assert!(validate_scope("COUNTER-1").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(10_000).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert_eq!(
            validate_quantity(5_000_000_000_000_000),
            Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            })
        );
    }

    #[test]
    fn test_validate_cash_and_price() {
        assert!(validate_cash_cents(0).is_ok());
        assert!(validate_cash_cents(-1).is_err());
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent(0).is_ok());
        assert!(validate_percent(100).is_ok());
        assert!(validate_percent(101).is_err());
    }

    #[test]
    fn test_validate_cart() {
        assert_eq!(validate_cart(&[]), Err(ValidationError::required("cart")));

        let ok = vec![CartItem::new("CLN003", 2), CartItem::new("MLK001", 1)];
        assert!(validate_cart(&ok).is_ok());

        let zero = vec![CartItem::new("CLN003", 0)];
        assert_eq!(
            validate_cart(&zero),
            Err(ValidationError::must_be_positive("quantity"))
        );

        let huge = vec![CartItem::new("CLN003", MAX_ITEM_QUANTITY + 1)];
        assert!(matches!(
            validate_cart(&huge),
            Err(ValidationError::OutOfRange { .. })
        ));

        let too_many: Vec<CartItem> = (0..=MAX_CART_LINES)
            .map(|i| CartItem::new(format!("P{}", i), 1))
            .collect();
        assert!(validate_cart(&too_many).is_err());
    }

    #[test]
    fn test_validate_route() {
        assert!(validate_route(StockLocation::MainStore, StockLocation::Shelf).is_ok());
        assert_eq!(
            validate_route(StockLocation::Web, StockLocation::Web),
            Err(ValidationError::SameLocation {
                location: StockLocation::Web
            })
        );
    }

    #[test]
    fn test_validate_expiry() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(validate_expiry(None, today).is_ok());
        assert!(validate_expiry(Some(today), today).is_ok());
        assert!(validate_expiry(NaiveDate::from_ymd_opt(2025, 5, 31), today).is_err());
    }
}
