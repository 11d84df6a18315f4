//! # Shop API
//!
//! HTTP server for the tenant shop: order placement, fulfillment, preorder
//! decisions, the public catalog and the generic resource surface.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shop API Services                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  OrderService  │  │PreorderService │  │  ResourceService           ││
//! │  │                │  │                │  │                            ││
//! │  │ • place        │  │ • create       │  │ • products, businesses     ││
//! │  │ • update       │  │ • approve/deny │  │ • users                    ││
//! │  │ • get/list     │  │ • get/list     │  │ • settings, applications   ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌──────────────────────────────────────────────┐  │
//! │  │ CatalogService │  │  Infrastructure                               │  │
//! │  │                │  │  SQLite (shop-db) • JWT session validation    │  │
//! │  │ • list         │  │                                               │  │
//! │  └────────────────┘  └──────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `SHOP_HTTP_PORT` - HTTP port (default: 8080)
//! - `SHOP_DATABASE_PATH` - SQLite file (default: ./shop.db)
//! - `SHOP_DB_MAX_CONNECTIONS` - pool size (default: 5)
//! - `SHOP_JWT_SECRET` - secret session tokens are signed with (required)
//! - `SHOP_TX_MAX_RETRIES` - write transaction retries (default: 5)
//! - `SHOP_PICKUP_CODE_ATTEMPTS` - pickup code draws per order (default: 20)

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;

use std::sync::Arc;

use shop_db::Database;

pub use auth::JwtManager;
pub use config::ShopConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, jwt: JwtManager) -> Self {
        AppState {
            db,
            jwt: Arc::new(jwt),
        }
    }
}
