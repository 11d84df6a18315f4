//! # Pricing & Discount Resolver
//!
//! Computes what a tenant pays per unit and what anonymous catalog viewers see.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  product.business_price = 10.00     business.discount_pct = 15         │
//! │                 │                              │                        │
//! │                 └──────────────┬───────────────┘                        │
//! │                                ▼                                        │
//! │          resolve_unit_price() = 10.00 − round(1.50) = 8.50             │
//! │                                                                         │
//! │  Anonymous viewer:  public_price() = product.public_price (verbatim)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The discount is validated when it is written ([`DiscountPct::new`]), never
//! clamped on read.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Business, Product};

// =============================================================================
// Discount Percentage
// =============================================================================

/// A whole-number discount percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(try_from = "i64", into = "i64")]
#[ts(export)]
pub struct DiscountPct(u8);

impl DiscountPct {
    pub const MAX: u8 = 100;

    /// Validates and wraps a percentage.
    ///
    /// ## Example
    /// ```rust
    /// use shop_core::pricing::DiscountPct;
    ///
    /// assert_eq!(DiscountPct::new(15).unwrap().value(), 15);
    /// assert!(DiscountPct::new(101).is_err());
    /// assert!(DiscountPct::new(-1).is_err());
    /// ```
    pub fn new(pct: i64) -> Result<Self, ValidationError> {
        if !(0..=Self::MAX as i64).contains(&pct) {
            return Err(ValidationError::OutOfRange {
                field: "discountPct".to_string(),
                min: 0,
                max: Self::MAX as i64,
            });
        }
        Ok(DiscountPct(pct as u8))
    }

    pub const fn none() -> Self {
        DiscountPct(0)
    }

    #[inline]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for DiscountPct {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        DiscountPct::new(value)
    }
}

impl From<DiscountPct> for i64 {
    fn from(d: DiscountPct) -> i64 {
        d.0 as i64
    }
}

// =============================================================================
// Resolvers
// =============================================================================

/// `resolveUnitPrice(product, business)`: the per-unit price the tenant pays.
///
/// Rounded once per unit; line totals are this times the quantity.
pub fn resolve_unit_price(product: &Product, business: &Business) -> Money {
    product.business_price().apply_discount(business.discount_pct)
}

/// The price shown to anonymous catalog viewers. Never discounted.
#[inline]
pub fn public_price(product: &Product) -> Money {
    product.public_price()
}

/// Line total for a quantity at an already-resolved unit price.
///
/// `None` when the product does not fit in minor units.
#[inline]
pub fn line_total(unit_price: Money, quantity: i64) -> Option<Money> {
    unit_price.checked_multiply_quantity(quantity)
}

/// Sums line totals, `None` on overflow.
pub fn order_total<I: IntoIterator<Item = Money>>(lines: I) -> Option<Money> {
    lines
        .into_iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(public: i64, business: i64) -> Product {
        Product {
            id: "p-1".to_string(),
            name: "Flour 1kg".to_string(),
            description: None,
            image_url: None,
            public_price_cents: public,
            business_price_cents: business,
            stock: 10,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn business(pct: i64) -> Business {
        Business {
            id: "b-1".to_string(),
            name: "Corner Bakery".to_string(),
            discount_pct: DiscountPct::new(pct).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_unit_price_applies_discount() {
        let p = product(1500, 1000);
        assert_eq!(resolve_unit_price(&p, &business(0)).cents(), 1000);
        assert_eq!(resolve_unit_price(&p, &business(15)).cents(), 850);
        assert_eq!(resolve_unit_price(&p, &business(100)).cents(), 0);
    }

    #[test]
    fn test_public_price_is_verbatim() {
        let p = product(1500, 1000);
        assert_eq!(public_price(&p).cents(), 1500);
    }

    #[test]
    fn test_discount_rejected_at_write_time() {
        assert!(DiscountPct::new(0).is_ok());
        assert!(DiscountPct::new(100).is_ok());
        assert!(matches!(
            DiscountPct::new(150),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(serde_json::from_str::<DiscountPct>("101").is_err());
        assert_eq!(serde_json::from_str::<DiscountPct>("20").unwrap().value(), 20);
    }

    #[test]
    fn test_line_totals_sum_rounded_units() {
        // 0.10 off 3.33 rounds each unit to 3.00
        let p = product(400, 333);
        let unit = resolve_unit_price(&p, &business(10));
        assert_eq!(line_total(unit, 3).map(|m| m.cents()), Some(900));
    }

    #[test]
    fn test_totals_refuse_overflow() {
        assert_eq!(line_total(Money::from_cents(i64::MAX / 2), 3), None);
        assert_eq!(
            order_total([Money::from_cents(i64::MAX), Money::from_cents(1)]),
            None
        );
        assert_eq!(
            order_total([Money::from_cents(200), Money::from_cents(50)]),
            Some(Money::from_cents(250))
        );
    }
}
