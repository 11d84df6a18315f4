//! # shop-db: Database Layer for the Tenant Shop
//!
//! SQLite persistence for the order/inventory engine. This is the only crate
//! that writes stock, and every stock write happens inside a transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tenant Shop Data Flow                            │
//! │                                                                         │
//! │  shop-api service (authorized + validated request)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     shop-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ OrderRepo ★    │    │              │ │   │
//! │  │   │ SqlitePool    │◄───│ PreorderRepo ★ │    │ 001_initial  │ │   │
//! │  │   │ TxPolicy      │    │ ProductRepo    │    │   _schema    │ │   │
//! │  │   │ (tx.rs retry) │    │ BusinessRepo   │    │              │ │   │
//! │  │   │               │    │ UserRepo       │    │              │ │   │
//! │  │   └───────────────┘    │ DocumentRepo   │    └──────────────┘ │   │
//! │  │                        └────────────────┘                      │   │
//! │  │          ★ = stock-moving, single-transaction operations       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (shop.db, WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use shop_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./shop.db")).await?;
//! let order = db.orders().place_order(&request).await?;
//! ```

pub mod credentials;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::document::{APPLICATIONS, SETTINGS};
pub use tx::TxPolicy;
