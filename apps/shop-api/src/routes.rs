//! HTTP routes.
//!
//! ## Endpoints
//! ```text
//! GET    /health                     liveness, database and migration check
//! GET    /catalog                    public (tenant-priced when signed in)
//! POST   /orders                     place an order              → 201
//! GET    /orders                     scoped to the caller's tenant
//! GET    /orders/{id}
//! PATCH  /orders/{id}                status / invoicePaid / delivery (staff)
//! POST   /preorders                  request items               → 201
//! GET    /preorders
//! GET    /preorders/{id}
//! POST   /preorders/{id}/approve     creates the pickup order    → 201
//! POST   /preorders/{id}/deny
//! GET    /{resource}                 generic pass-through
//! POST   /{resource}                                             → 201
//! GET    /{resource}/{id}
//! PUT    /{resource}/{id}
//! PATCH  /{resource}/{id}
//! DELETE /{resource}/{id}                                        → 204
//! ```
//!
//! Handlers that take a body check the permission matrix before decoding
//! it, so an anonymous or unpermitted caller sees 401/403 rather than 400.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use shop_core::permissions::{authorize, authorize_staff};
use shop_core::{
    Action, CatalogEntry, CreatePreorderRequest, Order, PlaceOrderRequest, Preorder, Resource,
    UpdateOrderRequest,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::services::{
    catalog_service::CatalogService, order_service::OrderService,
    preorder_service::PreorderService, resource_service::ResourceService,
};
use crate::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/catalog", get(catalog_handler))
        .route("/orders", post(place_order).get(list_orders))
        .route("/orders/{id}", get(get_order).patch(update_order))
        .route("/preorders", post(create_preorder).get(list_preorders))
        .route("/preorders/{id}", get(get_preorder))
        .route("/preorders/{id}/approve", post(approve_preorder))
        .route("/preorders/{id}/deny", post(deny_preorder))
        .route("/{resource}", get(list_resource).post(create_resource))
        .route(
            "/{resource}/{id}",
            get(get_resource)
                .put(update_resource)
                .patch(update_resource)
                .delete(delete_resource),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if !state.db.health_check().await {
        warn!("Health check failed: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "unreachable" })),
        );
    }

    match state.db.migration_status().await {
        Ok((total, applied)) if applied >= total => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "database": "ok",
                "migrations": { "applied": applied, "total": total },
            })),
        ),
        Ok((total, applied)) => {
            warn!(applied, total, "Health check failed: migrations pending");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "database": "ok",
                    "migrations": { "applied": applied, "total": total },
                })),
            )
        }
        Err(e) => {
            warn!(error = %e, "Health check failed: migration status unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "ok" })),
            )
        }
    }
}

async fn catalog_handler(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<CatalogEntry>>> {
    let entries = CatalogService::new(&state.db).list(caller.context()).await?;
    Ok(Json(entries))
}

// =============================================================================
// Orders
// =============================================================================

async fn place_order(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    authorize(caller.context(), Resource::Orders, Action::Write)?;
    let Json(request) = payload?;
    let order = OrderService::new(&state.db)
        .place(caller.context(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(OrderService::new(&state.db).list(caller.context()).await?))
}

async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(OrderService::new(&state.db).get(caller.context(), &id).await?))
}

async fn update_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> ApiResult<Json<Order>> {
    authorize_staff(caller.context(), Resource::Orders, Action::Write)?;
    let Json(patch) = payload?;
    let order = OrderService::new(&state.db)
        .update(caller.context(), &id, &patch)
        .await?;
    Ok(Json(order))
}

// =============================================================================
// Preorders
// =============================================================================

async fn create_preorder(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreatePreorderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Preorder>)> {
    authorize(caller.context(), Resource::Preorders, Action::Write)?;
    let Json(request) = payload?;
    let preorder = PreorderService::new(&state.db)
        .create(caller.context(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(preorder)))
}

async fn list_preorders(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<Preorder>>> {
    Ok(Json(PreorderService::new(&state.db).list(caller.context()).await?))
}

async fn get_preorder(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Preorder>> {
    Ok(Json(PreorderService::new(&state.db).get(caller.context(), &id).await?))
}

async fn approve_preorder(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = PreorderService::new(&state.db)
        .approve(caller.context(), &id)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn deny_preorder(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Preorder>> {
    Ok(Json(PreorderService::new(&state.db).deny(caller.context(), &id).await?))
}

// =============================================================================
// Generic resources
// =============================================================================

async fn list_resource(
    State(state): State<AppState>,
    caller: Caller,
    Path(resource): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(ResourceService::new(&state.db).list(caller.context(), &resource).await?))
}

async fn create_resource(
    State(state): State<AppState>,
    caller: Caller,
    Path(resource): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let service = ResourceService::new(&state.db);
    service.resolve(caller.context(), &resource, Action::Write)?;
    let Json(body) = payload?;
    let created = service
        .create(caller.context(), &resource, body)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_resource(
    State(state): State<AppState>,
    caller: Caller,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    Ok(Json(ResourceService::new(&state.db).get(caller.context(), &resource, &id).await?))
}

async fn update_resource(
    State(state): State<AppState>,
    caller: Caller,
    Path((resource, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let service = ResourceService::new(&state.db);
    service.resolve(caller.context(), &resource, Action::Write)?;
    let Json(body) = payload?;
    let updated = service
        .update(caller.context(), &resource, &id, body)
        .await?;
    Ok(Json(updated))
}

async fn delete_resource(
    State(state): State<AppState>,
    caller: Caller,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    ResourceService::new(&state.db)
        .delete(caller.context(), &resource, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
