//! # Seed Data Generator
//!
//! Creates the schema and the minimum data needed to log in and place an
//! order on a development database.
//!
//! ## Usage
//! ```bash
//! # Seed ./shop.db with the default owner password
//! cargo run -p shop-db --bin seed
//!
//! # Specify database path and owner password
//! cargo run -p shop-db --bin seed -- --db ./data/shop.db --password s3cret
//! ```
//!
//! ## Seeded Data
//! - Staff owner account `admin`
//! - Demo business "Harbor Café" with a 10% discount
//! - A handful of demo products
//! - Default settings document (id "1")
//!
//! Running it twice changes nothing: each step checks for its data first.

use serde_json::json;
use shop_core::pricing::DiscountPct;
use shop_core::{AccountRole, NewBusiness, NewProduct, NewUser, StaffRole, DEFAULT_SETTINGS_ID};
use shop_db::{Database, DbConfig, SETTINGS};
use std::env;

const DEFAULT_DB_PATH: &str = "./shop.db";
const DEFAULT_PASSWORD: &str = "1234";
const ADMIN_USERNAME: &str = "admin";
const DEMO_BUSINESS: &str = "Harbor Café";

/// (name, public price, business price, stock) in cents
const DEMO_PRODUCTS: &[(&str, i64, i64, i64)] = &[
    ("Sourdough Loaf", 650, 480, 40),
    ("Rye Bread", 590, 420, 30),
    ("Butter Croissant", 320, 210, 120),
    ("Cinnamon Bun", 380, 250, 80),
    ("Baguette", 290, 190, 60),
    ("Oat Cookies (6)", 450, 300, 25),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from(DEFAULT_DB_PATH);
    let mut password = String::from(DEFAULT_PASSWORD);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tenant Shop Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: {DEFAULT_DB_PATH})");
                println!("  -p, --password <PASS>    Password for the admin owner account (default: {DEFAULT_PASSWORD})");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tenant Shop Seed Data Generator");
    println!("==================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Owner account
    if db.users().get_by_username(ADMIN_USERNAME).await?.is_some() {
        println!("• Account '{}' already exists", ADMIN_USERNAME);
    } else {
        db.users()
            .insert(&NewUser {
                username: ADMIN_USERNAME.to_string(),
                password,
                account: AccountRole::Staff {
                    role: StaffRole::Owner,
                },
            })
            .await?;
        println!("✓ Created owner account '{}'", ADMIN_USERNAME);
    }

    // Demo tenant
    let businesses = db.businesses().list().await?;
    if businesses.iter().any(|b| b.name == DEMO_BUSINESS) {
        println!("• Business '{}' already exists", DEMO_BUSINESS);
    } else {
        let business = db
            .businesses()
            .insert(&NewBusiness {
                name: DEMO_BUSINESS.to_string(),
                discount_pct: DiscountPct::new(10)?,
            })
            .await?;
        println!("✓ Created business '{}' ({})", business.name, business.id);
    }

    // Catalog
    let existing = db.products().list_all().await?;
    let mut created = 0;
    for (name, public, business_price, stock) in DEMO_PRODUCTS {
        if existing.iter().any(|p| p.name == *name) {
            continue;
        }
        db.products()
            .insert(&NewProduct {
                name: name.to_string(),
                description: None,
                image_url: None,
                public_price_cents: *public,
                business_price_cents: *business_price,
                stock: *stock,
            })
            .await?;
        created += 1;
    }
    println!("✓ Created {} product(s), {} already present", created, DEMO_PRODUCTS.len() - created);

    // Settings
    if db.documents().get(SETTINGS, DEFAULT_SETTINGS_ID).await?.is_some() {
        println!("• Settings already present");
    } else {
        db.documents()
            .put(
                SETTINGS,
                DEFAULT_SETTINGS_ID,
                &json!({ "payoutPct": 60, "feePct": 0, "feeFlat": 0 }),
            )
            .await?;
        println!("✓ Created default settings");
    }

    db.close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
