//! # Repository Module
//!
//! Database repository implementations for the tenant shop.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  shop-api service (caller already authorized, input validated)         │
//! │       │                                                                 │
//! │       │  db.orders().place_order(&request)                             │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── place_order(&self, request)      one tx, retried on conflict     │
//! │  ├── update_order(&self, id, patch)   one tx, retried on conflict     │
//! │  ├── get(&self, id, scope)                                             │
//! │  └── list(&self, scope)                                                │
//! │       │                                                                 │
//! │       │  SQL (runtime-checked sqlx queries)                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD, soft delete
//! - [`business::BusinessRepository`] - Tenants and their discounts
//! - [`user::UserRepository`] - Staff and business accounts
//! - [`order::OrderRepository`] - Order placement and fulfillment updates
//! - [`preorder::PreorderRepository`] - Preorder requests and decisions
//! - [`document::DocumentRepository`] - Settings and applications documents

pub mod business;
pub mod document;
pub mod order;
pub mod preorder;
pub mod product;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the repository tests.

    use shop_core::{
        Business, DeliveryOption, ItemRequest, NewBusiness, NewProduct, PlaceOrderRequest,
        Product,
    };
    use shop_core::pricing::DiscountPct;

    use crate::pool::{Database, DbConfig};

    pub async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn new_product(name: &str, business_price_cents: i64, stock: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            image_url: None,
            public_price_cents: business_price_cents * 2,
            business_price_cents,
            stock,
        }
    }

    pub async fn seed_product(db: &Database, name: &str, price: i64, stock: i64) -> Product {
        db.products()
            .insert(&new_product(name, price, stock))
            .await
            .unwrap()
    }

    pub async fn seed_business(db: &Database, discount_pct: i64) -> Business {
        db.businesses()
            .insert(&NewBusiness {
                name: "Corner Bakery".to_string(),
                discount_pct: DiscountPct::new(discount_pct).unwrap(),
            })
            .await
            .unwrap()
    }

    pub fn order_request<S: AsRef<str>>(
        business_id: &str,
        delivery: DeliveryOption,
        items: &[(S, i64)],
    ) -> PlaceOrderRequest {
        PlaceOrderRequest {
            business_id: business_id.to_string(),
            placed_by_id: "anna".to_string(),
            delivery,
            items: items
                .iter()
                .map(|(product_id, qty)| ItemRequest {
                    product_id: product_id.as_ref().to_string(),
                    qty: *qty,
                })
                .collect(),
        }
    }

    pub async fn stock_of(db: &Database, product_id: &str) -> i64 {
        db.products()
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }
}
