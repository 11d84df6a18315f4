//! End-to-end tests driving the router in-process.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use shop_api::{router, AppState, JwtManager};
use shop_core::pricing::DiscountPct;
use shop_core::{BusinessRole, CallerContext, NewBusiness, NewProduct, StaffRole};
use shop_db::{Database, DbConfig};

const SECRET: &str = "api-test-secret";

struct TestApp {
    app: Router,
    db: Database,
    jwt: JwtManager,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let app = router(AppState::new(db.clone(), JwtManager::new(SECRET)));
        TestApp {
            app,
            db,
            jwt: JwtManager::new(SECRET),
        }
    }

    fn token(&self, caller: &CallerContext) -> String {
        self.jwt.issue_token(caller, Duration::minutes(10)).unwrap()
    }

    fn staff(&self, role: StaffRole) -> String {
        self.token(&CallerContext::staff("maria", role))
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn seed_product(&self, name: &str, public: i64, business: i64, stock: i64) -> String {
        self.db
            .products()
            .insert(&NewProduct {
                name: name.to_string(),
                description: None,
                image_url: None,
                public_price_cents: public,
                business_price_cents: business,
                stock,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_business(&self, name: &str, discount: i64) -> String {
        self.db
            .businesses()
            .insert(&NewBusiness {
                name: name.to_string(),
                discount_pct: DiscountPct::new(discount).unwrap(),
            })
            .await
            .unwrap()
            .id
    }
}

fn order_body(business_id: &str, placed_by: &str, delivery: &str, items: &[(&str, i64)]) -> Value {
    json!({
        "businessId": business_id,
        "placedById": placed_by,
        "delivery": delivery,
        "items": items
            .iter()
            .map(|(id, qty)| json!({ "productId": id, "qty": qty }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_health() {
    let t = TestApp::new().await;
    let (status, body) = t.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
    assert!(body["migrations"]["total"].as_u64().unwrap() > 0);
    assert_eq!(body["migrations"]["applied"], body["migrations"]["total"]);
}

#[tokio::test]
async fn test_place_order_as_business() {
    let t = TestApp::new().await;
    let a = t.seed_product("Sourdough", 150, 100, 5).await;
    let b = t.seed_product("Butter", 80, 50, 5).await;
    let business = t.seed_business("Corner Bakery", 0).await;
    let anna = t.token(&CallerContext::business("anna", BusinessRole::Employee, &business));

    let (status, order) = t
        .send(
            Method::POST,
            "/orders",
            Some(&anna),
            Some(order_body(&business, "anna", "pickup", &[(a.as_str(), 2), (b.as_str(), 1)])),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["totalCents"], 250);
    assert_eq!(order["invoice"]["totalCents"], 250);
    assert_eq!(order["invoice"]["paid"], false);
    assert_eq!(order["status"], "placed");
    assert_eq!(order["pickupCode"].as_str().map(str::len), Some(6));
}

#[tokio::test]
async fn test_orders_require_session() {
    let t = TestApp::new().await;
    let (status, body) = t.send(Method::GET, "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = t.send(Method::GET, "/orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_viewer_cannot_change_status() {
    let t = TestApp::new().await;
    let p = t.seed_product("Tea", 120, 100, 3).await;
    let business = t.seed_business("Corner Bakery", 0).await;
    let owner = t.staff(StaffRole::Owner);

    let (_, order) = t
        .send(
            Method::POST,
            "/orders",
            Some(&owner),
            Some(order_body(&business, "anna", "delivery", &[(p.as_str(), 1)])),
        )
        .await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let viewer = t.staff(StaffRole::Viewer);
    let (status, body) = t
        .send(Method::PATCH, &uri, Some(&viewer), Some(json!({ "status": "accepted" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (_, unchanged) = t.send(Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(unchanged["status"], "placed");
}

#[tokio::test]
async fn test_cancel_restocks_and_terminal_rejects() {
    let t = TestApp::new().await;
    let p = t.seed_product("Tea", 120, 100, 3).await;
    let business = t.seed_business("Corner Bakery", 0).await;
    let owner = t.staff(StaffRole::Owner);

    let (_, order) = t
        .send(
            Method::POST,
            "/orders",
            Some(&owner),
            Some(order_body(&business, "anna", "delivery", &[(p.as_str(), 2)])),
        )
        .await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, cancelled) = t
        .send(Method::PATCH, &uri, Some(&owner), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(t.db.products().get_by_id(&p).await.unwrap().unwrap().stock, 3);

    let (status, body) = t
        .send(Method::PATCH, &uri, Some(&owner), Some(json!({ "status": "accepted" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, paid) = t
        .send(Method::PATCH, &uri, Some(&owner), Some(json!({ "invoicePaid": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["invoice"]["paid"], true);
    assert_eq!(paid["totalCents"], 200);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let t = TestApp::new().await;
    let p = t.seed_product("Tea", 120, 100, 1).await;
    let business = t.seed_business("Corner Bakery", 0).await;
    let owner = t.staff(StaffRole::Owner);

    let (status, body) = t
        .send(
            Method::POST,
            "/orders",
            Some(&owner),
            Some(order_body(&business, "anna", "delivery", &[(p.as_str(), 2)])),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["error"]["details"]["available"], 1);
    assert_eq!(body["error"]["details"]["requested"], 2);
}

#[tokio::test]
async fn test_invalid_items_rejected_before_transaction() {
    let t = TestApp::new().await;
    let p = t.seed_product("Tea", 120, 100, 5).await;
    let business = t.seed_business("Corner Bakery", 0).await;
    let owner = t.staff(StaffRole::Owner);

    let (status, body) = t
        .send(
            Method::POST,
            "/orders",
            Some(&owner),
            Some(order_body(&business, "anna", "delivery", &[(p.as_str(), 0)])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");

    let (status, _) = t
        .send(
            Method::POST,
            "/orders",
            Some(&owner),
            Some(json!({ "businessId": business, "placedById": "anna", "delivery": "drone", "items": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_business_cannot_order_for_another_tenant() {
    let t = TestApp::new().await;
    let p = t.seed_product("Tea", 120, 100, 5).await;
    let mine = t.seed_business("Corner Bakery", 0).await;
    let theirs = t.seed_business("Harbor Café", 0).await;
    let anna = t.token(&CallerContext::business("anna", BusinessRole::Owner, &mine));

    let (status, _) = t
        .send(
            Method::POST,
            "/orders",
            Some(&anna),
            Some(order_body(&theirs, "anna", "delivery", &[(p.as_str(), 1)])),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(t.db.products().get_by_id(&p).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
async fn test_other_tenants_order_is_not_found() {
    let t = TestApp::new().await;
    let p = t.seed_product("Tea", 120, 100, 5).await;
    let mine = t.seed_business("Corner Bakery", 0).await;
    let theirs = t.seed_business("Harbor Café", 0).await;
    let owner = t.staff(StaffRole::Owner);

    let (_, order) = t
        .send(
            Method::POST,
            "/orders",
            Some(&owner),
            Some(order_body(&theirs, "emil", "delivery", &[(p.as_str(), 1)])),
        )
        .await;

    let anna = t.token(&CallerContext::business("anna", BusinessRole::Owner, &mine));
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());
    let (status, _) = t.send(Method::GET, &uri, Some(&anna), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, listed) = t.send(Method::GET, "/orders", Some(&anna), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_catalog_prices_per_caller() {
    let t = TestApp::new().await;
    t.seed_product("Sourdough", 450, 300, 4).await;
    t.seed_product("Rye", 400, 280, 0).await;
    let business = t.seed_business("Corner Bakery", 10).await;

    let (status, public) = t.send(Method::GET, "/catalog", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let sourdough = public
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == "Sourdough")
        .unwrap();
    assert_eq!(sourdough["priceCents"], 450);
    assert_eq!(sourdough["inStock"], true);

    let anna = t.token(&CallerContext::business("anna", BusinessRole::Employee, &business));
    let (_, tenant) = t.send(Method::GET, "/catalog", Some(&anna), None).await;
    let entries = tenant.as_array().unwrap();
    let sourdough = entries.iter().find(|e| e["name"] == "Sourdough").unwrap();
    let rye = entries.iter().find(|e| e["name"] == "Rye").unwrap();
    assert_eq!(sourdough["priceCents"], 270);
    assert_eq!(rye["inStock"], false);
}

#[tokio::test]
async fn test_preorder_approval_over_http() {
    let t = TestApp::new().await;
    let p = t.seed_product("Croissant", 250, 200, 10).await;
    let business = t.seed_business("Corner Bakery", 0).await;
    let anna = t.token(&CallerContext::business("anna", BusinessRole::Manager, &business));

    let (status, preorder) = t
        .send(
            Method::POST,
            "/preorders",
            Some(&anna),
            Some(json!({
                "businessId": business,
                "requestedById": "anna",
                "items": [{ "productId": p, "qty": 2 }],
                "note": "for Saturday",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(preorder["status"], "pending");
    let id = preorder["id"].as_str().unwrap().to_string();

    let approve_uri = format!("/preorders/{}/approve", id);
    let (status, _) = t.send(Method::POST, &approve_uri, Some(&anna), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff = t.staff(StaffRole::Inventory);
    let (status, order) = t.send(Method::POST, &approve_uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["delivery"], "pickup");
    assert_eq!(order["totalCents"], 400);

    let (status, body) = t.send(Method::POST, &approve_uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_DECIDED");

    let (status, body) = t
        .send(Method::POST, &format!("/preorders/{}/deny", id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_DECIDED");
}

#[tokio::test]
async fn test_generic_resources() {
    let t = TestApp::new().await;
    let owner = t.staff(StaffRole::Owner);

    let (status, _) = t.send(Method::GET, "/widgets", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, business) = t
        .send(
            Method::POST,
            "/businesses",
            Some(&owner),
            Some(json!({ "name": "Harbor Café", "discountPct": 15 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(business["discountPct"], 15);

    let (status, _) = t
        .send(
            Method::POST,
            "/businesses",
            Some(&owner),
            Some(json!({ "name": "Too Generous", "discountPct": 101 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, settings) = t
        .send(Method::POST, "/settings", Some(&owner), Some(json!({ "payoutPct": 60 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(settings["id"], "1");

    let (status, _) = t.send(Method::DELETE, "/settings/1", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let inventory = t.staff(StaffRole::Inventory);
    let (status, _) = t.send(Method::GET, "/settings/1", Some(&inventory), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_credentials_never_returned() {
    let t = TestApp::new().await;
    let hr = t.staff(StaffRole::Hr);

    let (status, user) = t
        .send(
            Method::POST,
            "/users",
            Some(&hr),
            Some(json!({
                "username": "jonas",
                "password": "s3cret-pass",
                "account": { "kind": "staff", "role": "orders" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());

    let (status, body) = t
        .send(
            Method::POST,
            "/users",
            Some(&hr),
            Some(json!({
                "username": "jonas",
                "password": "another-pass",
                "account": { "kind": "staff", "role": "viewer" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_product_delete_blocked_by_open_order() {
    let t = TestApp::new().await;
    let p = t.seed_product("Tea", 120, 100, 5).await;
    let business = t.seed_business("Corner Bakery", 0).await;
    let owner = t.staff(StaffRole::Owner);

    t.send(
        Method::POST,
        "/orders",
        Some(&owner),
        Some(order_body(&business, "anna", "delivery", &[(p.as_str(), 1)])),
    )
    .await;

    let (status, body) = t
        .send(Method::DELETE, &format!("/products/{}", p), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let t = TestApp::new().await;
    let owner = t.staff(StaffRole::Owner);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/orders")
        .header(header::AUTHORIZATION, format!("Bearer {}", owner))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_permission_checked_before_body_is_decoded() {
    let t = TestApp::new().await;
    let raw = |method: Method, uri: &str, token: Option<&str>| {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        request.body(Body::from("{ not json")).unwrap()
    };

    let response = t.app.clone().oneshot(raw(Method::POST, "/orders", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = t.app.clone().oneshot(raw(Method::POST, "/products", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let viewer = t.staff(StaffRole::Viewer);
    let response = t
        .app
        .clone()
        .oneshot(raw(Method::PATCH, "/orders/any", Some(&viewer)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_product_price_is_capped() {
    let t = TestApp::new().await;
    let owner = t.staff(StaffRole::Owner);

    let (status, body) = t
        .send(
            Method::POST,
            "/products",
            Some(&owner),
            Some(json!({
                "name": "Gold Bar",
                "publicPriceCents": 100,
                "businessPriceCents": 2_000_000_000_000_000_000_i64,
                "stock": 5,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
}
