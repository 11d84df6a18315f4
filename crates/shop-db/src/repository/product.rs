//! # Product Repository
//!
//! Catalog CRUD. Stock is only *set* here (staff inventory edits); order
//! placement and cancellation move stock through [`super::order`].
//!
//! ## Soft Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DELETE /products/p-1                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │  UPDATE products SET is_active = 0 WHERE id = 'p-1'   (takes the lock) │
//! │       │                                                                 │
//! │       ├── referenced by an open order?      → ROLLBACK, Conflict        │
//! │       ├── referenced by a pending preorder? → ROLLBACK, Conflict        │
//! │       ▼                                                                 │
//! │  COMMIT   (historical order lines keep pointing at the row)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use shop_core::{CoreError, NewProduct, Product, ProductPatch};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, image_url,
                   public_price_cents, business_price_cents, stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed active products");
        Ok(products)
    }

    /// Lists every product, including soft-deleted ones.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, image_url,
                   public_price_cents, business_price_cents, stock,
                   is_active, created_at, updated_at
            FROM products
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Gets a product by its ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, image_url,
                   public_price_cents, business_price_cents, stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product. Input must already be validated.
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            image_url: new.image_url.clone(),
            public_price_cents: new.public_price_cents,
            business_price_cents: new.business_price_cents,
            stock: new.stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, image_url,
                public_price_cents, business_price_cents, stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.public_price_cents)
        .bind(product.business_price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %product.id, "Product created");
        Ok(product)
    }

    /// Applies a partial update in one statement.
    ///
    /// A `stock` value replaces the current level; the schema's
    /// `CHECK (stock >= 0)` backs the validation done by the caller.
    /// Existing orders are unaffected: their lines carry frozen prices.
    pub async fn update(&self, id: &str, patch: &ProductPatch) -> DbResult<Product> {
        debug!(id = %id, "Updating product");

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                image_url = COALESCE(?4, image_url),
                public_price_cents = COALESCE(?5, public_price_cents),
                business_price_cents = COALESCE(?6, business_price_cents),
                stock = COALESCE(?7, stock),
                updated_at = ?8
            WHERE id = ?1
            RETURNING id, name, description, image_url,
                      public_price_cents, business_price_cents, stock,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(&patch.description)
        .bind(&patch.image_url)
        .bind(patch.public_price_cents)
        .bind(patch.business_price_cents)
        .bind(patch.stock)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))?;

        if patch.stock.is_some() {
            info!(id = %id, stock = product.stock, "Stock level set");
        }
        Ok(product)
    }

    /// Soft-deletes a product unless open orders or pending preorders use it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let mut tx = self.pool.begin().await?;

        // Write first so this transaction holds the lock for its checks
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        let open_orders: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE oi.product_id = ?1
              AND o.status NOT IN ('fulfilled', 'cancelled')
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let pending_preorders: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM preorder_items pi
            JOIN preorders p ON p.id = pi.preorder_id
            WHERE pi.product_id = ?1
              AND p.status = 'pending'
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if open_orders > 0 || pending_preorders > 0 {
            // Dropping the transaction rolls back the deactivation
            return Err(DbError::domain(CoreError::Conflict(format!(
                "product {} is referenced by {} open order line(s) and {} pending preorder line(s)",
                id, open_orders, pending_preorders
            ))));
        }

        tx.commit().await?;
        info!(id = %id, "Product deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_product, setup};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = db.products();

        let created = repo.insert(&new_product("Rye Flour", 500, 12)).await.unwrap();
        let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "Rye Flour");
        assert_eq!(fetched.business_price_cents, 500);
        assert_eq!(fetched.stock, 12);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let db = setup().await;
        let repo = db.products();
        let created = repo.insert(&new_product("Oats", 300, 4)).await.unwrap();

        let patch = ProductPatch {
            business_price_cents: Some(350),
            stock: Some(9),
            ..Default::default()
        };
        let updated = repo.update(&created.id, &patch).await.unwrap();

        assert_eq!(updated.name, "Oats");
        assert_eq!(updated.business_price_cents, 350);
        assert_eq!(updated.stock, 9);
        assert!(matches!(
            repo.update("missing", &patch).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_negative_stock_rejected_by_schema() {
        let db = setup().await;
        let repo = db.products();
        let created = repo.insert(&new_product("Salt", 100, 1)).await.unwrap();

        let patch = ProductPatch {
            stock: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            repo.update(&created.id, &patch).await,
            Err(DbError::CheckViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_active_list() {
        let db = setup().await;
        let repo = db.products();
        let created = repo.insert(&new_product("Yeast", 90, 3)).await.unwrap();

        repo.deactivate(&created.id).await.unwrap();

        assert!(repo.list_active().await.unwrap().is_empty());
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
        assert!(matches!(
            repo.deactivate("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
