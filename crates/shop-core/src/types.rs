//! # Domain Types
//!
//! Core domain types used throughout the tenant shop.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Business     │   │  UserAccount    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  public_price   │   │  discount_pct   │   │  username       │       │
//! │  │  business_price │   │  (0..=100)      │   │  Staff | Biz    │       │
//! │  │  stock (>= 0)   │   │                 │   │  (no password)  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │──▶│   OrderItem     │   │    Preorder     │       │
//! │  │  ─────────────  │   │  unit price     │   │  ─────────────  │       │
//! │  │  status         │   │  (frozen)       │   │  pending        │       │
//! │  │  pickup_code    │   └─────────────────┘   │  approved│denied│       │
//! │  │  invoice ───────┼──▶ Invoice (total      │  order_id       │       │
//! │  └─────────────────┘    frozen, paid)       └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Order lines copy the product name and resolved unit price at placement.
//! Later price edits never touch existing orders or invoices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::pricing::DiscountPct;
use crate::session::{BusinessRole, StaffRole};

// =============================================================================
// Product
// =============================================================================

/// A catalog product shared by all tenants.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,

    /// Price shown on the public catalog.
    pub public_price_cents: i64,

    /// Price before the tenant discount.
    pub business_price_cents: i64,

    /// Units on hand. Never negative.
    pub stock: i64,

    /// False once soft-deleted.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn public_price(&self) -> Money {
        Money::from_cents(self.public_price_cents)
    }

    #[inline]
    pub fn business_price(&self) -> Money {
        Money::from_cents(self.business_price_cents)
    }
}

/// Fields for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub public_price_cents: i64,
    pub business_price_cents: i64,
    #[serde(default)]
    pub stock: i64,
}

/// Partial product update. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub public_price_cents: Option<i64>,
    pub business_price_cents: Option<i64>,
    /// Absolute stock level set by staff.
    pub stock: Option<i64>,
}

/// A product as one caller sees it in the catalog.
///
/// `price_cents` is the public price for anonymous viewers and the resolved
/// tenant price for business users.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub in_stock: bool,
}

// =============================================================================
// Business
// =============================================================================

/// A tenant placing orders at its own discount.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub discount_pct: DiscountPct,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewBusiness {
    pub name: String,
    #[serde(default)]
    pub discount_pct: DiscountPct,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BusinessPatch {
    pub name: Option<String>,
    pub discount_pct: Option<DiscountPct>,
}

// =============================================================================
// User Accounts
// =============================================================================

/// Which role space an account lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum AccountRole {
    Staff {
        role: StaffRole,
    },
    Business {
        role: BusinessRole,
        #[serde(rename = "businessId")]
        business_id: String,
    },
}

/// A staff or business user. The credential hash is never part of this type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub account: AccountRole,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub account: AccountRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub password: Option<String>,
    pub account: Option<AccountRole>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfillment state of an order. See [`crate::fulfillment`] for the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Accepted,
    Processing,
    OutForDelivery,
    ReadyForPickup,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Processing => "processing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Placed
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Delivery Option
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOption {
    Pickup,
    Delivery,
}

impl DeliveryOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOption::Pickup => "pickup",
            DeliveryOption::Delivery => "delivery",
        }
    }
}

impl std::str::FromStr for DeliveryOption {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(DeliveryOption::Pickup),
            "delivery" => Ok(DeliveryOption::Delivery),
            _ => Err(ValidationError::NotAllowed {
                field: "delivery".to_string(),
                allowed: vec!["pickup".to_string(), "delivery".to_string()],
            }),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A line in a committed order. Unit price is frozen at placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderItem {
    pub product_id: String,
    /// Product name at time of order (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Billing record created with the order. Only `paid` ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub order_id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub total_cents: i64,
    pub paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub business_id: String,
    /// Username of whoever placed (or, for approved preorders, requested) it.
    pub placed_by: String,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub delivery: DeliveryOption,
    /// Six digits, present iff `delivery` is pickup.
    pub pickup_code: Option<String>,
    pub invoice: Invoice,
    /// Set when the order came from an approved preorder.
    pub preorder_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Sum of the frozen line totals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

// =============================================================================
// Preorder
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PreorderStatus {
    Pending,
    Approved,
    Denied,
}

impl PreorderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreorderStatus::Pending => "pending",
            PreorderStatus::Approved => "approved",
            PreorderStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for PreorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested line. No price until approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PreorderItem {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Preorder {
    pub id: String,
    pub business_id: String,
    pub requested_by: String,
    pub items: Vec<PreorderItem>,
    pub note: Option<String>,
    pub status: PreorderStatus,
    /// The order created on approval.
    pub order_id: Option<String>,
    pub decided_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Requests
// =============================================================================

/// `{productId, qty}` as sent by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemRequest {
    pub product_id: String,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlaceOrderRequest {
    pub business_id: String,
    pub placed_by_id: String,
    pub delivery: DeliveryOption,
    pub items: Vec<ItemRequest>,
}

/// `PATCH /orders/{id}` body. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub invoice_paid: Option<bool>,
    pub delivery: Option<DeliveryOption>,
}

impl UpdateOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.invoice_paid.is_none() && self.delivery.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePreorderRequest {
    pub business_id: String,
    pub requested_by_id: String,
    pub items: Vec<ItemRequest>,
    #[serde(default)]
    pub note: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
