//! Preorder requests and staff decisions.

use shop_core::permissions::{authorize, authorize_staff};
use shop_core::validation::{validate_id, validate_items, validate_note};
use shop_core::{
    Action, CallerContext, CoreError, CreatePreorderRequest, Order, Preorder, Resource,
};
use shop_db::Database;
use tracing::debug;

use super::{ensure_own_tenant, require_caller};
use crate::error::ApiResult;

pub struct PreorderService<'a> {
    db: &'a Database,
}

impl<'a> PreorderService<'a> {
    pub fn new(db: &'a Database) -> Self {
        PreorderService { db }
    }

    /// Records a request. No stock is held until approval.
    pub async fn create(
        &self,
        caller: Option<&CallerContext>,
        request: &CreatePreorderRequest,
    ) -> ApiResult<Preorder> {
        authorize(caller, Resource::Preorders, Action::Write)?;
        let caller = require_caller(caller)?;

        validate_id("businessId", &request.business_id)?;
        validate_id("requestedById", &request.requested_by_id)?;
        validate_items(&request.items)?;
        validate_note(request.note.as_deref())?;
        ensure_own_tenant(
            caller,
            Resource::Preorders,
            &request.business_id,
            &request.requested_by_id,
        )?;

        Ok(self.db.preorders().create(request).await?)
    }

    /// Converts a pending preorder into a pickup order.
    pub async fn approve(&self, caller: Option<&CallerContext>, id: &str) -> ApiResult<Order> {
        authorize_staff(caller, Resource::Preorders, Action::Write)?;
        let caller = require_caller(caller)?;
        validate_id("id", id)?;

        let order = self.db.preorders().approve(id, caller.username()).await?;
        debug!(preorder_id = %id, decided_by = %caller.username(), "Preorder approval committed");
        Ok(order)
    }

    pub async fn deny(&self, caller: Option<&CallerContext>, id: &str) -> ApiResult<Preorder> {
        authorize_staff(caller, Resource::Preorders, Action::Write)?;
        let caller = require_caller(caller)?;
        validate_id("id", id)?;

        let preorder = self.db.preorders().deny(id, caller.username()).await?;
        debug!(preorder_id = %id, decided_by = %caller.username(), "Preorder denial committed");
        Ok(preorder)
    }

    pub async fn get(&self, caller: Option<&CallerContext>, id: &str) -> ApiResult<Preorder> {
        authorize(caller, Resource::Preorders, Action::Read)?;
        let scope = require_caller(caller)?.business_scope();

        self.db
            .preorders()
            .get(id, scope)
            .await?
            .ok_or_else(|| CoreError::not_found("Preorder", id).into())
    }

    pub async fn list(&self, caller: Option<&CallerContext>) -> ApiResult<Vec<Preorder>> {
        authorize(caller, Resource::Preorders, Action::Read)?;
        let scope = require_caller(caller)?.business_scope();

        Ok(self.db.preorders().list(scope).await?)
    }
}
