//! Public catalog.
//!
//! Anonymous and staff viewers see `publicPrice` verbatim. A business caller
//! sees the unit price its tenant would actually pay.

use shop_core::pricing::{public_price, resolve_unit_price};
use shop_core::{CallerContext, CatalogEntry, CoreError, Money, Product};
use shop_db::Database;
use tracing::debug;

use crate::error::ApiResult;

pub struct CatalogService<'a> {
    db: &'a Database,
}

impl<'a> CatalogService<'a> {
    pub fn new(db: &'a Database) -> Self {
        CatalogService { db }
    }

    pub async fn list(&self, caller: Option<&CallerContext>) -> ApiResult<Vec<CatalogEntry>> {
        let products = self.db.products().list_active().await?;

        let business = match caller.and_then(CallerContext::business_scope) {
            Some(business_id) => Some(
                self.db
                    .businesses()
                    .get_by_id(business_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Business", business_id))?,
            ),
            None => None,
        };
        debug!(products = products.len(), tenant_priced = business.is_some(), "Listing catalog");

        Ok(products
            .iter()
            .map(|product| {
                let price = match &business {
                    Some(business) => resolve_unit_price(product, business),
                    None => public_price(product),
                };
                entry(product, price)
            })
            .collect())
    }
}

fn entry(product: &Product, price: Money) -> CatalogEntry {
    CatalogEntry {
        id: product.id.clone(),
        name: product.name.clone(),
        description: product.description.clone(),
        image_url: product.image_url.clone(),
        price_cents: price.cents(),
        in_stock: product.stock > 0,
    }
}
