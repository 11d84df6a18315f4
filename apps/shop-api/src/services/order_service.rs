//! Order placement and fulfillment.
//!
//! ## Request Flow
//! ```text
//! POST /orders ──► authorize(orders, write) ──► validate ──► own tenant?
//!                                                               │
//!                                                               ▼
//!                                          OrderRepository::place_order (one tx)
//!
//! PATCH /orders/{id} ──► authorize_staff(orders, write) ──► update_order (one tx)
//! ```

use shop_core::validation::{validate_id, validate_items};
use shop_core::{
    permissions::{authorize, authorize_staff},
    Action, CallerContext, CoreError, Order, PlaceOrderRequest, Resource, UpdateOrderRequest,
    ValidationError,
};
use shop_db::Database;
use tracing::debug;

use super::{ensure_own_tenant, require_caller};
use crate::error::ApiResult;

pub struct OrderService<'a> {
    db: &'a Database,
}

impl<'a> OrderService<'a> {
    pub fn new(db: &'a Database) -> Self {
        OrderService { db }
    }

    pub async fn place(
        &self,
        caller: Option<&CallerContext>,
        request: &PlaceOrderRequest,
    ) -> ApiResult<Order> {
        authorize(caller, Resource::Orders, Action::Write)?;
        let caller = require_caller(caller)?;

        validate_id("businessId", &request.business_id)?;
        validate_id("placedById", &request.placed_by_id)?;
        validate_items(&request.items)?;
        ensure_own_tenant(
            caller,
            Resource::Orders,
            &request.business_id,
            &request.placed_by_id,
        )?;

        let order = self.db.orders().place_order(request).await?;
        debug!(order_id = %order.id, caller = %caller.username(), "Order placed by caller");
        Ok(order)
    }

    /// Status, paid flag and delivery changes. Staff only.
    pub async fn update(
        &self,
        caller: Option<&CallerContext>,
        id: &str,
        patch: &UpdateOrderRequest,
    ) -> ApiResult<Order> {
        let role = authorize_staff(caller, Resource::Orders, Action::Write)?;

        validate_id("id", id)?;
        if patch.is_empty() {
            return Err(ValidationError::Required {
                field: "status, invoicePaid or delivery".to_string(),
            }
            .into());
        }

        let order = self.db.orders().update_order(id, patch).await?;
        debug!(order_id = %id, role = %role, "Order updated by staff");
        Ok(order)
    }

    /// Another tenant's order is reported as missing.
    pub async fn get(&self, caller: Option<&CallerContext>, id: &str) -> ApiResult<Order> {
        authorize(caller, Resource::Orders, Action::Read)?;
        let scope = require_caller(caller)?.business_scope();

        self.db
            .orders()
            .get(id, scope)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", id).into())
    }

    pub async fn list(&self, caller: Option<&CallerContext>) -> ApiResult<Vec<Order>> {
        authorize(caller, Resource::Orders, Action::Read)?;
        let scope = require_caller(caller)?.business_scope();

        Ok(self.db.orders().list(scope).await?)
    }
}
