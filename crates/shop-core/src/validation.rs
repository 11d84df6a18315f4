//! # Validation Module
//!
//! Input validation for the tenant shop.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (serde)                                       │
//! │  ├── Shape and enum checks (delivery, status)                          │
//! │  └── Malformed JSON → ValidationError                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service (Rust)                                               │
//! │  └── THIS MODULE: rules checked before any transaction opens           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (discount_pct BETWEEN 0 AND 100)        │
//! │  ├── UNIQUE (username), active pickup codes                            │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use shop_core::validation::{validate_quantity, validate_username};
//!
//! validate_quantity(5).unwrap();
//! validate_username("anna").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{ItemRequest, NewProduct, ProductPatch};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS, MAX_PRICE_CENTS, MAX_STOCK};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_NOTE_LEN: usize = 1000;
const MIN_USERNAME_LEN: usize = 2;
const MAX_USERNAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 4;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required identifier (product, business, order...).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a display name for a product or business.
///
/// ## Example
/// ```rust
/// use shop_core::validation::validate_name;
///
/// assert!(validate_name("Rye Flour 1kg").is_ok());
/// assert!(validate_name("   ").is_err());
/// ```
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Usernames: letters, digits, `.`, `_` and `-`.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let len = username.chars().count();
    if username.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }
    if len < MIN_USERNAME_LEN {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: MIN_USERNAME_LEN,
        });
    }
    if len > MAX_USERNAME_LEN {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME_LEN,
        });
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

pub fn validate_note(note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LEN => Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LEN,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "qty".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "qty".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Prices may be zero but never negative, and are capped at `MAX_PRICE_CENTS`.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK).contains(&stock) {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: MAX_STOCK,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates an order or preorder item list.
///
/// ## User Workflow
/// ```text
/// POST /orders  items: [{productId: "p-1", qty: 0}]
///      │
///      ▼
/// validate_items() ← THIS FUNCTION
///      │
///      ├── empty?           → Required("items")
///      ├── > 100 lines?     → OutOfRange("items")
///      ├── blank productId? → Required("productId")
///      ├── qty <= 0?        → MustBePositive("qty")
///      │
///      └── OK → transaction opens
/// ```
pub fn validate_items(items: &[ItemRequest]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }

    for item in items {
        validate_id("productId", &item.product_id)?;
        validate_quantity(item.qty)?;
    }

    Ok(())
}

pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_name(&product.name)?;
    validate_price_cents("publicPriceCents", product.public_price_cents)?;
    validate_price_cents("businessPriceCents", product.business_price_cents)?;
    validate_stock(product.stock)
}

pub fn validate_product_patch(patch: &ProductPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(cents) = patch.public_price_cents {
        validate_price_cents("publicPriceCents", cents)?;
    }
    if let Some(cents) = patch.business_price_cents {
        validate_price_cents("businessPriceCents", cents)?;
    }
    if let Some(stock) = patch.stock {
        validate_stock(stock)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: &str, qty: i64) -> ItemRequest {
        ItemRequest {
            product_id: product_id.to_string(),
            qty,
        }
    }

    #[test]
    fn test_validate_items() {
        assert!(validate_items(&[item("p-1", 1), item("p-2", 3)]).is_ok());

        assert!(matches!(
            validate_items(&[]),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_items(&[item("p-1", 0)]),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_items(&[item("  ", 1)]),
            Err(ValidationError::Required { .. })
        ));

        let too_many: Vec<_> = (0..=MAX_ORDER_ITEMS).map(|i| item(&format!("p-{i}"), 1)).collect();
        assert!(validate_items(&too_many).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("admin").is_ok());
        assert!(validate_username("anna.k").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("a").is_err());
        assert!(validate_username("has space").is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let mut product = NewProduct {
            name: "Rye Flour".to_string(),
            description: None,
            image_url: None,
            public_price_cents: 450,
            business_price_cents: 300,
            stock: 12,
        };
        assert!(validate_new_product(&product).is_ok());

        product.stock = -1;
        assert!(validate_new_product(&product).is_err());

        product.stock = 0;
        product.business_price_cents = -5;
        assert!(validate_new_product(&product).is_err());

        product.business_price_cents = 2_000_000_000_000_000_000;
        assert!(matches!(
            validate_new_product(&product),
            Err(ValidationError::OutOfRange { field, .. }) if field == "businessPriceCents"
        ));

        product.business_price_cents = MAX_PRICE_CENTS;
        product.stock = MAX_STOCK + 1;
        assert!(validate_new_product(&product).is_err());
    }

    #[test]
    fn test_validate_password_and_note() {
        assert!(validate_password("1234").is_ok());
        assert!(validate_password("123").is_err());
        assert!(validate_note(None).is_ok());
        assert!(validate_note(Some(&"x".repeat(1001))).is_err());
    }
}
