//! # Business Repository
//!
//! Tenants. A business's `discount_pct` is read at order placement; changing
//! it never touches orders already committed.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use shop_core::{Business, BusinessPatch, CoreError, NewBusiness};

/// Repository for business (tenant) operations.
#[derive(Debug, Clone)]
pub struct BusinessRepository {
    pool: SqlitePool,
}

impl BusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BusinessRepository { pool }
    }

    pub async fn list(&self) -> DbResult<Vec<Business>> {
        let businesses = sqlx::query_as::<_, Business>(
            "SELECT id, name, discount_pct, created_at, updated_at FROM businesses ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(businesses)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Business>> {
        let business = sqlx::query_as::<_, Business>(
            "SELECT id, name, discount_pct, created_at, updated_at FROM businesses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(business)
    }

    pub async fn insert(&self, new: &NewBusiness) -> DbResult<Business> {
        let now = Utc::now();
        let business = Business {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            discount_pct: new.discount_pct,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO businesses (id, name, discount_pct, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&business.id)
        .bind(&business.name)
        .bind(business.discount_pct)
        .bind(business.created_at)
        .bind(business.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %business.id, discount_pct = business.discount_pct.value(), "Business created");
        Ok(business)
    }

    pub async fn update(&self, id: &str, patch: &BusinessPatch) -> DbResult<Business> {
        debug!(id = %id, "Updating business");

        sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses SET
                name = COALESCE(?2, name),
                discount_pct = COALESCE(?3, discount_pct),
                updated_at = ?4
            WHERE id = ?1
            RETURNING id, name, discount_pct, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(patch.discount_pct)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Business", id))
    }

    /// Deletes a business that nothing references yet.
    ///
    /// Orders, preorders and user accounts all pin a business; once any
    /// exist the tenant can only be edited.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        // Touch the row first so the reference checks run under the write lock
        let result = sqlx::query("UPDATE businesses SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Business", id));
        }

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM orders WHERE business_id = ?1)
                 + (SELECT COUNT(*) FROM preorders WHERE business_id = ?1)
                 + (SELECT COUNT(*) FROM users WHERE business_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if references > 0 {
            return Err(DbError::domain(CoreError::Conflict(format!(
                "business {} still has {} order(s), preorder(s) or user(s)",
                id, references
            ))));
        }

        sqlx::query("DELETE FROM businesses WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(id = %id, "Business deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{order_request, seed_business, seed_product, setup};
    use shop_core::pricing::DiscountPct;
    use shop_core::DeliveryOption;

    #[tokio::test]
    async fn test_insert_update_get() {
        let db = setup().await;
        let repo = db.businesses();
        let created = seed_business(&db, 10).await;

        let updated = repo
            .update(
                &created.id,
                &BusinessPatch {
                    discount_pct: Some(DiscountPct::new(25).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.discount_pct.value(), 25);
        assert_eq!(updated.name, "Corner Bakery");
        let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.discount_pct.value(), 25);
    }

    #[tokio::test]
    async fn test_delete_unreferenced() {
        let db = setup().await;
        let created = seed_business(&db, 0).await;

        db.businesses().delete(&created.id).await.unwrap();

        assert!(db.businesses().get_by_id(&created.id).await.unwrap().is_none());
        assert!(matches!(
            db.businesses().delete(&created.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_with_orders_is_conflict() {
        let db = setup().await;
        let business = seed_business(&db, 0).await;
        let product = seed_product(&db, "Tea", 120, 3).await;
        db.orders()
            .place_order(&order_request(
                &business.id,
                DeliveryOption::Delivery,
                &[(&product.id, 1)],
            ))
            .await
            .unwrap();

        assert!(matches!(
            db.businesses().delete(&business.id).await,
            Err(DbError::Domain(CoreError::Conflict(_)))
        ));
        assert!(db.businesses().get_by_id(&business.id).await.unwrap().is_some());
    }
}
