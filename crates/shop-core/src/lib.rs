//! # shop-core: Pure Business Logic for the Tenant Shop
//!
//! This crate holds every rule of the order/inventory engine that can be
//! expressed without touching a database: money math, tenant pricing, the
//! role/resource permission matrix, and the fulfillment state machine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tenant Shop Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    shop-api (axum)                              │   │
//! │  │    POST /orders, PATCH /orders/{id}, /preorders/{id}/approve   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ shop-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌──────────┐ │   │
//! │  │   │   types   │  │  pricing  │  │ permissions │  │fulfillment│ │   │
//! │  │   │  Order    │  │ unit price│  │ role matrix │  │ status    │ │   │
//! │  │   │  Preorder │  │ discounts │  │ caller ctx  │  │ machine   │ │   │
//! │  │   └───────────┘  └───────────┘  └─────────────┘  └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    shop-db (Database Layer)                     │   │
//! │  │      inventory ledger, order transactions, repositories         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Business, Order, Preorder, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Tenant unit price and public price resolution
//! - [`permissions`] - Static role/resource permission matrix
//! - [`session`] - Resolved caller context (staff or business)
//! - [`fulfillment`] - Legal order status transitions
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use shop_core::money::Money;
//! use shop_core::pricing::DiscountPct;
//!
//! let business_price = Money::from_cents(1000);
//! let discount = DiscountPct::new(15).unwrap();
//!
//! assert_eq!(business_price.apply_discount(discount).cents(), 850);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod fulfillment;
pub mod money;
pub mod permissions;
pub mod pricing;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use permissions::{Action, Resource, Role};
pub use pricing::DiscountPct;
pub use session::{BusinessRole, CallerContext, StaffRole};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct line items in a single order or preorder.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Guards against typing 10000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 9999;

/// Highest accepted unit price, in minor units.
///
/// A full order at this price still fits an `i64` total.
pub const MAX_PRICE_CENTS: i64 = 100_000_000_000;

/// Highest stock level a product may be set to.
pub const MAX_STOCK: i64 = 1_000_000_000;

/// Lowest pickup code (6 digits, no leading zero).
pub const PICKUP_CODE_MIN: u32 = 100_000;

/// Highest pickup code.
pub const PICKUP_CODE_MAX: u32 = 999_999;

/// Id of the singleton settings document.
pub const DEFAULT_SETTINGS_ID: &str = "1";
