//! # Order Repository
//!
//! The order transaction engine. Every stock movement caused by an order
//! happens here, inside the same transaction as the order write.
//!
//! ## Placement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  place_order(request)                          (retried on Busy)        │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   1. per line:  UPDATE products SET stock = stock - qty                 │
//! │                 WHERE id = ? AND is_active = 1 AND stock >= qty         │
//! │                 RETURNING *                                             │
//! │                 └─ no row → InsufficientStock, ROLLBACK everything      │
//! │   2. load business → resolve unit price per line (discount applied)     │
//! │   3. pickup? → draw a code not used by any open order                   │
//! │   4. INSERT orders, order_items (frozen prices), invoices               │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The decrement is the first statement of the transaction, so the write
//! lock is taken before any stock is read. A second placement against the
//! same product waits on `busy_timeout` and then sees the committed level.
//!
//! ## Updates
//! Status writes are compare-and-set on the status read at the start of the
//! transaction. Losing the race yields `WriteConflict` and the whole update
//! is re-run, so a cancellation can never restock twice.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::tx::{retry_transaction, TxPolicy};
use shop_core::fulfillment::{ensure_open, plan_transition, StatusChange};
use shop_core::pricing::{line_total, order_total, resolve_unit_price};
use shop_core::{
    Business, CoreError, DeliveryOption, Invoice, Order, OrderItem, OrderStatus,
    PlaceOrderRequest, Product, UpdateOrderRequest, ValidationError, PICKUP_CODE_MAX,
    PICKUP_CODE_MIN,
};

// =============================================================================
// Row Types
// =============================================================================

/// `orders` row before items and invoice are attached.
#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderRow {
    id: String,
    business_id: String,
    placed_by: String,
    total_cents: i64,
    status: OrderStatus,
    delivery: DeliveryOption,
    pickup_code: Option<String>,
    preorder_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>, invoice: Invoice) -> Order {
        Order {
            id: self.id,
            business_id: self.business_id,
            placed_by: self.placed_by,
            items,
            total_cents: self.total_cents,
            status: self.status,
            delivery: self.delivery,
            pickup_code: self.pickup_code,
            invoice,
            preorder_id: self.preorder_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: String,
    #[sqlx(flatten)]
    item: OrderItem,
}

const SELECT_ORDER: &str = r#"
    SELECT id, business_id, placed_by, total_cents, status, delivery,
           pickup_code, preorder_id, created_at, updated_at
    FROM orders
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders, invoices and the stock they move.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    policy: TxPolicy,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool, policy: TxPolicy) -> Self {
        OrderRepository { pool, policy }
    }

    /// Places an order atomically. Input must already be validated.
    ///
    /// ## Errors
    /// - `InsufficientStock` for the first line that cannot be covered
    ///   (missing and inactive products report `available: 0`)
    /// - `NotFound` when the business does not exist
    /// - `RetriesExhausted` when the write lock stayed contended
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> DbResult<Order> {
        debug!(
            business_id = %request.business_id,
            lines = request.items.len(),
            delivery = %request.delivery.as_str(),
            "Placing order"
        );

        let order = retry_transaction(&self.policy, "place_order", move || {
            self.try_place_order(request)
        })
        .await?;

        info!(
            order_id = %order.id,
            business_id = %order.business_id,
            total_cents = order.total_cents,
            "Order placed"
        );
        Ok(order)
    }

    async fn try_place_order(&self, request: &PlaceOrderRequest) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;
        let order = place_order_in_tx(&mut tx, request, None, &self.policy).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Applies a staff update: delivery option, then status, then `invoice.paid`.
    ///
    /// All three land in one transaction or none do.
    pub async fn update_order(&self, id: &str, patch: &UpdateOrderRequest) -> DbResult<Order> {
        debug!(order_id = %id, ?patch, "Updating order");

        let order = retry_transaction(&self.policy, "update_order", move || {
            self.try_update_order(id, patch)
        })
        .await?;

        info!(order_id = %id, status = %order.status, paid = order.invoice.paid, "Order updated");
        Ok(order)
    }

    async fn try_update_order(&self, id: &str, patch: &UpdateOrderRequest) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        let mut touched = false;

        if let Some(delivery) = patch.delivery {
            if delivery != current.delivery {
                ensure_open(id, current.status, delivery.as_str())?;
                change_delivery(&mut tx, &current, delivery, &self.policy).await?;
                touched = true;
            }
        }

        if let Some(to) = patch.status {
            match plan_transition(id, current.status, to)? {
                StatusChange::Unchanged => {}
                StatusChange::Move { from, to } => {
                    compare_and_set_status(&mut tx, id, from, to).await?;
                    touched = true;
                }
                StatusChange::Cancel { from } => {
                    compare_and_set_status(&mut tx, id, from, OrderStatus::Cancelled).await?;
                    restock(&mut tx, id).await?;
                    touched = true;
                }
            }
        }

        if let Some(paid) = patch.invoice_paid {
            sqlx::query("UPDATE invoices SET paid = ?2 WHERE order_id = ?1")
                .bind(id)
                .bind(paid)
                .execute(&mut *tx)
                .await?;
            touched = true;
        }

        if touched {
            sqlx::query("UPDATE orders SET updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
        }

        let order = load_order(&mut tx, id, None)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        tx.commit().await?;
        Ok(order)
    }

    /// Gets an order. With a business scope, other tenants' orders are hidden.
    pub async fn get(&self, id: &str, business_scope: Option<&str>) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, id, business_scope).await
    }

    /// Lists orders newest first, optionally for one business only.
    pub async fn list(&self, business_scope: Option<&str>) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE (?1 IS NULL OR business_id = ?1) ORDER BY created_at DESC, id"
        ))
        .bind(business_scope)
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT oi.order_id, oi.product_id, oi.name_snapshot, oi.quantity,
                   oi.unit_price_cents, oi.line_total_cents
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE (?1 IS NULL OR o.business_id = ?1)
            ORDER BY oi.order_id, oi.line_no
            "#,
        )
        .bind(business_scope)
        .fetch_all(&self.pool)
        .await?;

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.id, i.order_id, i.date, i.total_cents, i.paid
            FROM invoices i
            JOIN orders o ON o.id = i.order_id
            WHERE (?1 IS NULL OR o.business_id = ?1)
            "#,
        )
        .bind(business_scope)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.item);
        }
        let mut invoices: HashMap<String, Invoice> = invoices
            .into_iter()
            .map(|invoice| (invoice.order_id.clone(), invoice))
            .collect();

        rows.into_iter()
            .map(|row| {
                let invoice = invoices
                    .remove(&row.id)
                    .ok_or_else(|| DbError::Corrupt(format!("order {} has no invoice", row.id)))?;
                let lines = items.remove(&row.id).unwrap_or_default();
                Ok(row.into_order(lines, invoice))
            })
            .collect()
    }
}

// =============================================================================
// Transaction Building Blocks
// =============================================================================

/// Places an order on an open transaction. Shared with preorder approval.
pub(crate) async fn place_order_in_tx(
    conn: &mut SqliteConnection,
    request: &PlaceOrderRequest,
    preorder_id: Option<&str>,
    policy: &TxPolicy,
) -> DbResult<Order> {
    let now = Utc::now();

    // 1. Take the stock. Any failure drops the transaction and undoes
    //    the lines already decremented.
    let mut products = Vec::with_capacity(request.items.len());
    for item in &request.items {
        products.push(take_stock(conn, &item.product_id, item.qty, now).await?);
    }

    // 2. Price every line against the tenant's discount
    let business = sqlx::query_as::<_, Business>(
        "SELECT id, name, discount_pct, created_at, updated_at FROM businesses WHERE id = ?1",
    )
    .bind(&request.business_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::domain(CoreError::not_found("Business", request.business_id.as_str())))?;

    let items = request
        .items
        .iter()
        .zip(&products)
        .map(|(item, product)| -> DbResult<OrderItem> {
            let unit = resolve_unit_price(product, &business);
            let line = line_total(unit, item.qty).ok_or_else(total_out_of_range)?;
            Ok(OrderItem {
                product_id: product.id.clone(),
                name_snapshot: product.name.clone(),
                quantity: item.qty,
                unit_price_cents: unit.cents(),
                line_total_cents: line.cents(),
            })
        })
        .collect::<DbResult<Vec<_>>>()?;
    let total =
        order_total(items.iter().map(OrderItem::line_total)).ok_or_else(total_out_of_range)?;

    // 3. Pickup code iff pickup
    let pickup_code = match request.delivery {
        DeliveryOption::Pickup => Some(draw_pickup_code(conn, policy).await?),
        DeliveryOption::Delivery => None,
    };

    // 4. Persist order, lines and invoice
    let order_id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, business_id, placed_by, total_cents, status, delivery,
            pickup_code, preorder_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&order_id)
    .bind(&business.id)
    .bind(&request.placed_by_id)
    .bind(total.cents())
    .bind(OrderStatus::Placed)
    .bind(request.delivery)
    .bind(&pickup_code)
    .bind(preorder_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for (line_no, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, line_no, product_id, name_snapshot,
                quantity, unit_price_cents, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&order_id)
        .bind(line_no as i64)
        .bind(&item.product_id)
        .bind(&item.name_snapshot)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.line_total_cents)
        .execute(&mut *conn)
        .await?;
    }

    let invoice = Invoice {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.clone(),
        date: now,
        total_cents: total.cents(),
        paid: false,
    };
    sqlx::query(
        "INSERT INTO invoices (id, order_id, date, total_cents, paid) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&invoice.id)
    .bind(&invoice.order_id)
    .bind(invoice.date)
    .bind(invoice.total_cents)
    .bind(invoice.paid)
    .execute(&mut *conn)
    .await?;

    Ok(Order {
        id: order_id,
        business_id: business.id,
        placed_by: request.placed_by_id.clone(),
        items,
        total_cents: total.cents(),
        status: OrderStatus::Placed,
        delivery: request.delivery,
        pickup_code,
        invoice,
        preorder_id: preorder_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    })
}

fn total_out_of_range() -> DbError {
    DbError::from(ValidationError::OutOfRange {
        field: "totalCents".to_string(),
        min: 0,
        max: i64::MAX,
    })
}

/// Decrements one line's stock, or reports what is actually available.
async fn take_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    qty: i64,
    now: DateTime<Utc>,
) -> DbResult<Product> {
    if qty > 0 {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock = stock - ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1 AND stock >= ?2
            RETURNING id, name, description, image_url,
                      public_price_cents, business_price_cents, stock,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(product_id)
        .bind(qty)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(product) = product {
            return Ok(product);
        }
    }

    let available: Option<i64> =
        sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1 AND is_active = 1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    warn!(product_id = %product_id, requested = qty, ?available, "Insufficient stock");
    Err(DbError::domain(CoreError::InsufficientStock {
        product_id: product_id.to_string(),
        available: available.unwrap_or(0),
        requested: qty,
    }))
}

/// Draws a six-digit code that no open order holds.
async fn draw_pickup_code(conn: &mut SqliteConnection, policy: &TxPolicy) -> DbResult<String> {
    for _ in 0..policy.pickup_code_attempts {
        let code = rand::thread_rng()
            .gen_range(PICKUP_CODE_MIN..=PICKUP_CODE_MAX)
            .to_string();

        let taken: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM orders
            WHERE pickup_code = ?1 AND status NOT IN ('fulfilled', 'cancelled')
            "#,
        )
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;

        if taken.is_none() {
            return Ok(code);
        }
        debug!(code = %code, "Pickup code in use, redrawing");
    }
    Err(DbError::PickupCodeExhausted(policy.pickup_code_attempts))
}

/// Switches the delivery option, keeping `pickup_code` in step.
async fn change_delivery(
    conn: &mut SqliteConnection,
    current: &OrderRow,
    delivery: DeliveryOption,
    policy: &TxPolicy,
) -> DbResult<()> {
    let pickup_code = match delivery {
        DeliveryOption::Pickup => match &current.pickup_code {
            Some(code) => Some(code.clone()),
            None => Some(draw_pickup_code(conn, policy).await?),
        },
        DeliveryOption::Delivery => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE orders SET delivery = ?2, pickup_code = ?3
        WHERE id = ?1 AND status = ?4 AND delivery = ?5
        "#,
    )
    .bind(&current.id)
    .bind(delivery)
    .bind(&pickup_code)
    .bind(current.status)
    .bind(current.delivery)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::WriteConflict(format!("order {}", current.id)));
    }
    Ok(())
}

async fn compare_and_set_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE orders SET status = ?3 WHERE id = ?1 AND status = ?2")
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::WriteConflict(format!("order {}", id)));
    }
    debug!(order_id = %id, %from, %to, "Status written");
    Ok(())
}

/// Puts every line's quantity back on its product.
async fn restock(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    let lines: Vec<(String, i64)> = sqlx::query_as(
        "SELECT product_id, quantity FROM order_items WHERE order_id = ?1 ORDER BY line_no",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    let now = Utc::now();
    for (product_id, quantity) in &lines {
        sqlx::query("UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1")
            .bind(product_id)
            .bind(quantity)
            .bind(now)
            .execute(&mut *conn)
            .await?;
    }

    info!(order_id = %order_id, lines = lines.len(), "Order restocked");
    Ok(())
}

/// Loads one order with its lines and invoice.
pub(crate) async fn load_order(
    conn: &mut SqliteConnection,
    id: &str,
    business_scope: Option<&str>,
) -> DbResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "{SELECT_ORDER} WHERE id = ?1 AND (?2 IS NULL OR business_id = ?2)"
    ))
    .bind(id)
    .bind(business_scope)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT product_id, name_snapshot, quantity, unit_price_cents, line_total_cents
        FROM order_items
        WHERE order_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let invoice = sqlx::query_as::<_, Invoice>(
        "SELECT id, order_id, date, total_cents, paid FROM invoices WHERE order_id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::Corrupt(format!("order {} has no invoice", id)))?;

    Ok(Some(row.into_order(items, invoice)))
}

// =============================================================================
// Unit Tests
// =============================================================================
