//! # Preorder Repository
//!
//! Preorders hold no stock until a staff member approves them. Approval runs
//! the order transaction engine and flips the preorder in the same
//! transaction:
//!
//! ```text
//!  pending ──approve──▶ BEGIN
//!                        place_order_in_tx(pickup, requested_by)  ─✗─▶ ROLLBACK
//!                        UPDATE preorders SET status = 'approved'      (still pending)
//!                          WHERE id = ? AND status = 'pending'
//!                       COMMIT ──▶ approved + order_id
//!
//!  pending ──deny─────▶ UPDATE … SET status = 'denied' WHERE status = 'pending'
//!
//!  approved | denied ──approve/deny──▶ AlreadyDecided
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::order::place_order_in_tx;
use crate::tx::{retry_transaction, TxPolicy};
use shop_core::{
    CoreError, CreatePreorderRequest, DeliveryOption, ItemRequest, Order, PlaceOrderRequest,
    Preorder, PreorderItem, PreorderStatus,
};

#[derive(Debug, sqlx::FromRow)]
struct PreorderRow {
    id: String,
    business_id: String,
    requested_by: String,
    note: Option<String>,
    status: PreorderStatus,
    order_id: Option<String>,
    decided_by: Option<String>,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl PreorderRow {
    fn into_preorder(self, items: Vec<PreorderItem>) -> Preorder {
        Preorder {
            id: self.id,
            business_id: self.business_id,
            requested_by: self.requested_by,
            items,
            note: self.note,
            status: self.status,
            order_id: self.order_id,
            decided_by: self.decided_by,
            created_at: self.created_at,
            decided_at: self.decided_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PreorderItemRow {
    preorder_id: String,
    #[sqlx(flatten)]
    item: PreorderItem,
}

const SELECT_PREORDER: &str = r#"
    SELECT id, business_id, requested_by, note, status, order_id,
           decided_by, created_at, decided_at
    FROM preorders
"#;

#[derive(Debug, Clone)]
pub struct PreorderRepository {
    pool: SqlitePool,
    policy: TxPolicy,
}

impl PreorderRepository {
    pub fn new(pool: SqlitePool, policy: TxPolicy) -> Self {
        PreorderRepository { pool, policy }
    }

    /// Records a pending preorder. No stock is touched.
    ///
    /// ## Errors
    /// - `NotFound` when the business, or any product, does not exist or
    ///   the product is no longer active
    pub async fn create(&self, request: &CreatePreorderRequest) -> DbResult<Preorder> {
        let preorder = retry_transaction(&self.policy, "create_preorder", move || {
            self.try_create(request)
        })
        .await?;

        info!(
            preorder_id = %preorder.id,
            business_id = %preorder.business_id,
            lines = preorder.items.len(),
            "Preorder created"
        );
        Ok(preorder)
    }

    async fn try_create(&self, request: &CreatePreorderRequest) -> DbResult<Preorder> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO preorders (id, business_id, requested_by, note, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&request.business_id)
        .bind(&request.requested_by_id)
        .bind(&note)
        .bind(PreorderStatus::Pending)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::ForeignKeyViolation { .. } => DbError::domain(CoreError::not_found(
                "Business",
                request.business_id.as_str(),
            )),
            other => other,
        })?;

        let mut items = Vec::with_capacity(request.items.len());
        for (line_no, item) in request.items.iter().enumerate() {
            let active: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1 AND is_active = 1")
                    .bind(&item.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if active.is_none() {
                return Err(DbError::domain(CoreError::not_found(
                    "Product",
                    item.product_id.as_str(),
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO preorder_items (preorder_id, line_no, product_id, quantity)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&id)
            .bind(line_no as i64)
            .bind(&item.product_id)
            .bind(item.qty)
            .execute(&mut *tx)
            .await?;

            items.push(PreorderItem {
                product_id: item.product_id.clone(),
                quantity: item.qty,
            });
        }

        tx.commit().await?;

        Ok(Preorder {
            id,
            business_id: request.business_id.clone(),
            requested_by: request.requested_by_id.clone(),
            items,
            note,
            status: PreorderStatus::Pending,
            order_id: None,
            decided_by: None,
            created_at: now,
            decided_at: None,
        })
    }

    /// Approves a pending preorder, creating its pickup order.
    ///
    /// On `InsufficientStock` nothing is written and the preorder stays
    /// pending so it can be approved once stock is back.
    pub async fn approve(&self, id: &str, decided_by: &str) -> DbResult<Order> {
        debug!(preorder_id = %id, decided_by = %decided_by, "Approving preorder");

        let order = retry_transaction(&self.policy, "approve_preorder", move || {
            self.try_approve(id, decided_by)
        })
        .await?;

        info!(preorder_id = %id, order_id = %order.id, "Preorder approved");
        Ok(order)
    }

    async fn try_approve(&self, id: &str, decided_by: &str) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let preorder = load_preorder(&mut tx, id, None)
            .await?
            .ok_or_else(|| DbError::domain(CoreError::not_found("Preorder", id)))?;
        ensure_pending(&preorder)?;

        let request = PlaceOrderRequest {
            business_id: preorder.business_id.clone(),
            placed_by_id: preorder.requested_by.clone(),
            delivery: DeliveryOption::Pickup,
            items: preorder
                .items
                .iter()
                .map(|item| ItemRequest {
                    product_id: item.product_id.clone(),
                    qty: item.quantity,
                })
                .collect(),
        };
        let order = place_order_in_tx(&mut tx, &request, Some(id), &self.policy).await?;

        let result = sqlx::query(
            r#"
            UPDATE preorders
            SET status = 'approved', order_id = ?2, decided_by = ?3, decided_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(&order.id)
        .bind(decided_by)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::WriteConflict(format!("preorder {}", id)));
        }

        tx.commit().await?;
        Ok(order)
    }

    /// Denies a pending preorder.
    pub async fn deny(&self, id: &str, decided_by: &str) -> DbResult<Preorder> {
        let preorder = retry_transaction(&self.policy, "deny_preorder", move || {
            self.try_deny(id, decided_by)
        })
        .await?;

        info!(preorder_id = %id, decided_by = %decided_by, "Preorder denied");
        Ok(preorder)
    }

    async fn try_deny(&self, id: &str, decided_by: &str) -> DbResult<Preorder> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE preorders
            SET status = 'denied', decided_by = ?2, decided_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(decided_by)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let preorder = load_preorder(&mut tx, id, None)
            .await?
            .ok_or_else(|| DbError::domain(CoreError::not_found("Preorder", id)))?;

        if result.rows_affected() == 0 {
            // Exists but was not pending
            return Err(DbError::domain(CoreError::AlreadyDecided {
                preorder_id: id.to_string(),
                status: preorder.status.to_string(),
            }));
        }

        tx.commit().await?;
        Ok(preorder)
    }

    pub async fn get(&self, id: &str, business_scope: Option<&str>) -> DbResult<Option<Preorder>> {
        let mut conn = self.pool.acquire().await?;
        load_preorder(&mut conn, id, business_scope).await
    }

    /// Lists preorders newest first, optionally for one business only.
    pub async fn list(&self, business_scope: Option<&str>) -> DbResult<Vec<Preorder>> {
        let rows = sqlx::query_as::<_, PreorderRow>(&format!(
            "{SELECT_PREORDER} WHERE (?1 IS NULL OR business_id = ?1) ORDER BY created_at DESC, id"
        ))
        .bind(business_scope)
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query_as::<_, PreorderItemRow>(
            r#"
            SELECT pi.preorder_id, pi.product_id, pi.quantity
            FROM preorder_items pi
            JOIN preorders p ON p.id = pi.preorder_id
            WHERE (?1 IS NULL OR p.business_id = ?1)
            ORDER BY pi.preorder_id, pi.line_no
            "#,
        )
        .bind(business_scope)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<String, Vec<PreorderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.preorder_id).or_default().push(row.item);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_preorder(lines)
            })
            .collect())
    }
}

fn ensure_pending(preorder: &Preorder) -> DbResult<()> {
    if preorder.status != PreorderStatus::Pending {
        return Err(DbError::domain(CoreError::AlreadyDecided {
            preorder_id: preorder.id.clone(),
            status: preorder.status.to_string(),
        }));
    }
    Ok(())
}

async fn load_preorder(
    conn: &mut SqliteConnection,
    id: &str,
    business_scope: Option<&str>,
) -> DbResult<Option<Preorder>> {
    let row = sqlx::query_as::<_, PreorderRow>(&format!(
        "{SELECT_PREORDER} WHERE id = ?1 AND (?2 IS NULL OR business_id = ?2)"
    ))
    .bind(id)
    .bind(business_scope)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, PreorderItem>(
        "SELECT product_id, quantity FROM preorder_items WHERE preorder_id = ?1 ORDER BY line_no",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_preorder(items)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{
        order_request, seed_business, seed_product, setup, stock_of,
    };
    use shop_core::ProductPatch;

    async fn file_backed(dir: &tempfile::TempDir) -> Database {
        Database::new(DbConfig::new(dir.path().join("shop.db")).max_connections(4))
            .await
            .unwrap()
    }

    fn preorder_request(business_id: &str, product_id: &str, qty: i64) -> CreatePreorderRequest {
        CreatePreorderRequest {
            business_id: business_id.to_string(),
            requested_by_id: "emil".to_string(),
            items: vec![ItemRequest {
                product_id: product_id.to_string(),
                qty,
            }],
            note: Some("  for Friday  ".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_holds_no_stock() {
        let db = setup().await;
        let business = seed_business(&db, 0).await;
        let p = seed_product(&db, "Flour", 200, 5).await;

        let preorder = db
            .preorders()
            .create(&preorder_request(&business.id, &p.id, 3))
            .await
            .unwrap();

        assert_eq!(preorder.status, PreorderStatus::Pending);
        assert_eq!(preorder.note.as_deref(), Some("for Friday"));
        assert_eq!(stock_of(&db, &p.id).await, 5);

        let fetched = db.preorders().get(&preorder.id, Some(business.id.as_str())).await.unwrap();
        assert_eq!(fetched.unwrap().items, preorder.items);
    }

    #[tokio::test]
    async fn test_create_requires_business_and_products() {
        let db = setup().await;
        let business = seed_business(&db, 0).await;
        let p = seed_product(&db, "Flour", 200, 5).await;

        let missing_business = db
            .preorders()
            .create(&preorder_request("nobody", &p.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(missing_business, DbError::Domain(CoreError::NotFound { .. })));

        let missing_product = db
            .preorders()
            .create(&preorder_request(&business.id, "nothing", 1))
            .await
            .unwrap_err();
        assert!(matches!(missing_product, DbError::Domain(CoreError::NotFound { .. })));
        assert!(db.preorders().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approve_creates_pickup_order() {
        let db = setup().await;
        let business = seed_business(&db, 20).await;
        let p = seed_product(&db, "Flour", 200, 5).await;
        let preorder = db
            .preorders()
            .create(&preorder_request(&business.id, &p.id, 3))
            .await
            .unwrap();

        let order = db.preorders().approve(&preorder.id, "admin").await.unwrap();

        assert_eq!(order.delivery, DeliveryOption::Pickup);
        assert!(order.pickup_code.is_some());
        assert_eq!(order.placed_by, "emil");
        assert_eq!(order.preorder_id.as_deref(), Some(preorder.id.as_str()));
        assert_eq!(order.total_cents, 480);
        assert_eq!(stock_of(&db, &p.id).await, 2);

        let decided = db.preorders().get(&preorder.id, None).await.unwrap().unwrap();
        assert_eq!(decided.status, PreorderStatus::Approved);
        assert_eq!(decided.order_id.as_deref(), Some(order.id.as_str()));
        assert_eq!(decided.decided_by.as_deref(), Some("admin"));
        assert!(decided.decided_at.is_some());

        assert!(matches!(
            db.preorders().approve(&preorder.id, "admin").await,
            Err(DbError::Domain(CoreError::AlreadyDecided { .. }))
        ));
        assert!(matches!(
            db.preorders().deny(&preorder.id, "admin").await,
            Err(DbError::Domain(CoreError::AlreadyDecided { .. }))
        ));
        assert_eq!(db.orders().list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_without_stock_stays_pending() {
        let db = setup().await;
        let business = seed_business(&db, 0).await;
        let p = seed_product(&db, "Flour", 200, 5).await;
        let preorder = db
            .preorders()
            .create(&preorder_request(&business.id, &p.id, 4))
            .await
            .unwrap();

        db.products()
            .update(
                &p.id,
                &ProductPatch {
                    stock: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = db.preorders().approve(&preorder.id, "admin").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, requested: 4, .. })
        ));

        let still = db.preorders().get(&preorder.id, None).await.unwrap().unwrap();
        assert_eq!(still.status, PreorderStatus::Pending);
        assert!(still.order_id.is_none());
        assert!(db.orders().list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deny_is_final() {
        let db = setup().await;
        let business = seed_business(&db, 0).await;
        let p = seed_product(&db, "Flour", 200, 5).await;
        let preorder = db
            .preorders()
            .create(&preorder_request(&business.id, &p.id, 1))
            .await
            .unwrap();

        let denied = db.preorders().deny(&preorder.id, "admin").await.unwrap();
        assert_eq!(denied.status, PreorderStatus::Denied);
        assert_eq!(denied.decided_by.as_deref(), Some("admin"));

        assert!(matches!(
            db.preorders().approve(&preorder.id, "admin").await,
            Err(DbError::Domain(CoreError::AlreadyDecided { .. }))
        ));
        assert!(matches!(
            db.preorders().deny("missing", "admin").await,
            Err(DbError::Domain(CoreError::NotFound { .. }))
        ));
        assert_eq!(stock_of(&db, &p.id).await, 5);
    }

    #[tokio::test]
    async fn test_pending_preorder_blocks_product_delete() {
        let db = setup().await;
        let business = seed_business(&db, 0).await;
        let p = seed_product(&db, "Flour", 200, 5).await;
        let preorder = db
            .preorders()
            .create(&preorder_request(&business.id, &p.id, 1))
            .await
            .unwrap();

        assert!(matches!(
            db.products().deactivate(&p.id).await,
            Err(DbError::Domain(CoreError::Conflict(_)))
        ));

        db.preorders().deny(&preorder.id, "admin").await.unwrap();
        db.products().deactivate(&p.id).await.unwrap();
        assert!(!db.products().get_by_id(&p.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_concurrent_approvals_convert_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_backed(&dir).await;
        let business = seed_business(&db, 0).await;
        let p = seed_product(&db, "Flour", 200, 10).await;
        let preorder = db
            .preorders()
            .create(&preorder_request(&business.id, &p.id, 1))
            .await
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                let id = preorder.id.clone();
                tokio::spawn(async move { db.preorders().approve(&id, "admin").await })
            })
            .collect();

        let mut approved = 0;
        let mut already_decided = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => approved += 1,
                Err(DbError::Domain(CoreError::AlreadyDecided { .. })) => already_decided += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!((approved, already_decided), (1, 3));
        assert_eq!(db.orders().list(None).await.unwrap().len(), 1);
        assert_eq!(stock_of(&db, &p.id).await, 9);
        let decided = db.preorders().get(&preorder.id, None).await.unwrap().unwrap();
        assert_eq!(decided.status, PreorderStatus::Approved);
    }

    #[tokio::test]
    async fn test_approval_races_order_for_last_unit() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_backed(&dir).await;
        let business = seed_business(&db, 0).await;
        let p = seed_product(&db, "Last Sack", 200, 1).await;
        let preorder = db
            .preorders()
            .create(&preorder_request(&business.id, &p.id, 1))
            .await
            .unwrap();

        let approve = {
            let db = db.clone();
            let id = preorder.id.clone();
            tokio::spawn(async move { db.preorders().approve(&id, "admin").await.map(|_| ()) })
        };
        let place = {
            let db = db.clone();
            let request = order_request(&business.id, DeliveryOption::Delivery, &[(&p.id, 1)]);
            tokio::spawn(async move { db.orders().place_order(&request).await.map(|_| ()) })
        };

        let approved = approve.await.unwrap();
        let placed = place.await.unwrap();
        for result in [&approved, &placed] {
            assert!(matches!(
                result,
                Ok(()) | Err(DbError::Domain(CoreError::InsufficientStock { available: 0, .. }))
            ));
        }
        assert!(approved.is_ok() != placed.is_ok());
        assert_eq!(stock_of(&db, &p.id).await, 0);
        assert_eq!(db.orders().list(None).await.unwrap().len(), 1);

        let status = db.preorders().get(&preorder.id, None).await.unwrap().unwrap().status;
        let expected = if approved.is_ok() {
            PreorderStatus::Approved
        } else {
            PreorderStatus::Pending
        };
        assert_eq!(status, expected);
    }
}
