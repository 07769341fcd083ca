//! Admin catalog and stock management through the router: key gate,
//! payload confidentiality and the storefront listing side of it

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use toko_server::api;
use toko_server::core::state::AppState;
use toko_server::reconcile::reconcile;

use support::{ADMIN_KEY, paid, seed_order, state_in_memory};

/// Run one request against a fresh router, admin key included unless
/// `key` overrides it
async fn request(
    state: &AppState,
    method: &str,
    path: &str,
    key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(key) = key {
        builder = builder.header("X-Admin-Key", key);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = api::create_router(state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn admin(
    state: &AppState,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    request(state, method, path, Some(ADMIN_KEY), body).await
}

fn error_code(body: &Value) -> u64 {
    body["error"]["code"].as_u64().expect("error code in body")
}

#[tokio::test]
async fn test_admin_endpoints_require_the_key() {
    let (state, _mailer) = state_in_memory().await;

    let (status, _) = request(&state, "GET", "/api/admin/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&state, "GET", "/api/admin/products", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = admin(&state, "GET", "/api/admin/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn test_health_is_public() {
    let (state, _mailer) = state_in_memory().await;
    let (status, body) = request(&state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn test_catalog_and_stock_lifecycle() {
    let (state, _mailer) = state_in_memory().await;

    let (status, body) = admin(
        &state,
        "POST",
        "/api/admin/products",
        Some(json!({
            "slug": "game-key",
            "title": "Game Key",
            "description": "Steam key",
            "price_idr": 50000,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = admin(
        &state,
        "POST",
        &format!("/api/admin/products/{product_id}/stock"),
        Some(json!({ "items": ["AAAA-BBBB", "CCCC-DDDD"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["added"], json!(2));

    // Stock listing never carries the payload, not even encrypted
    let (status, body) = admin(
        &state,
        "GET",
        &format!("/api/admin/products/{product_id}/stock"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert!(row.get("content").is_none());
        assert_eq!(row["is_sold"], json!(false));
    }

    // Storefront sees the product with both units
    let (status, body) = request(&state, "GET", "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let listing = body["data"].as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["slug"], json!("game-key"));
    assert_eq!(listing[0]["available"], json!(2));

    // Deactivation pulls it from the listing
    let (status, _) = admin(
        &state,
        "PUT",
        &format!("/api/admin/products/{product_id}"),
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&state, "GET", "/api/products", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_duplicate_slug_is_a_conflict() {
    let (state, _mailer) = state_in_memory().await;
    let req = json!({ "slug": "ebook", "title": "Ebook", "price_idr": 10000 });

    let (status, _) = admin(&state, "POST", "/api/admin/products", Some(req.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = admin(&state, "POST", "/api/admin/products", Some(req)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert_eq!(error_code(&body), 4);
}

#[tokio::test]
async fn test_slug_format_is_enforced() {
    let (state, _mailer) = state_in_memory().await;
    let (status, _) = admin(
        &state,
        "POST",
        "/api/admin/products",
        Some(json!({ "slug": "Bad Slug!", "title": "X", "price_idr": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_legacy_products_refuse_pool_stock() {
    let (state, _mailer) = state_in_memory().await;
    let (status, body) = admin(
        &state,
        "POST",
        "/api/admin/products",
        Some(json!({
            "slug": "old-album",
            "title": "Old Album",
            "price_idr": 75000,
            "legacy_content": "https://dl.example/album.zip",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let product_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["is_legacy"], json!(true));

    let (status, _) = admin(
        &state,
        "POST",
        &format!("/api/admin/products/{product_id}/stock"),
        Some(json!({ "items": ["unit"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sold_stock_is_immutable() {
    let (state, _mailer) = state_in_memory().await;

    let (_, body) = admin(
        &state,
        "POST",
        "/api/admin/products",
        Some(json!({ "slug": "ebook", "title": "Ebook", "price_idr": 50000 })),
    )
    .await;
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    admin(
        &state,
        "POST",
        &format!("/api/admin/products/{product_id}/stock"),
        Some(json!({ "items": ["KEY-A"] })),
    )
    .await;

    let (_, body) = admin(
        &state,
        "GET",
        &format!("/api/admin/products/{product_id}/stock"),
        None,
    )
    .await;
    let stock_id = body["data"][0]["id"].as_str().unwrap().to_string();

    // Sell the unit
    let order_id = seed_order(&state.pool, &product_id, 1, 50_000, "midtrans", None).await;
    let (paid_status, details) = paid(50_000);
    reconcile(&state, &order_id, paid_status, details)
        .await
        .unwrap();

    let (status, _) = admin(
        &state,
        "PUT",
        &format!("/api/admin/stock/{stock_id}"),
        Some(json!({ "content": "KEY-A-FIXED" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = admin(&state, "DELETE", &format!("/api/admin/stock/{stock_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The sold-out product no longer shows on the storefront
    let (_, body) = request(&state, "GET", "/api/products", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // The admin order view carries the allocation
    let (status, body) = admin(&state, "GET", &format!("/api/admin/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], json!("PAID"));
    assert_eq!(
        body["data"]["order"]["stock_item_ids"],
        json!([stock_id])
    );
}

#[tokio::test]
async fn test_deleting_last_unit_marks_sold_out_and_restock_revives() {
    let (state, _mailer) = state_in_memory().await;

    let (_, body) = admin(
        &state,
        "POST",
        "/api/admin/products",
        Some(json!({ "slug": "ebook", "title": "Ebook", "price_idr": 50000 })),
    )
    .await;
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    admin(
        &state,
        "POST",
        &format!("/api/admin/products/{product_id}/stock"),
        Some(json!({ "items": ["KEY-A"] })),
    )
    .await;

    let (_, body) = admin(
        &state,
        "GET",
        &format!("/api/admin/products/{product_id}/stock"),
        None,
    )
    .await;
    let stock_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = admin(&state, "DELETE", &format!("/api/admin/stock/{stock_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    // Pool empty: hidden from the storefront
    let (_, body) = request(&state, "GET", "/api/products", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // Restocking brings it back
    admin(
        &state,
        "POST",
        &format!("/api/admin/products/{product_id}/stock"),
        Some(json!({ "items": ["KEY-B", "KEY-C"] })),
    )
    .await;
    let (_, body) = request(&state, "GET", "/api/products", None, None).await;
    let listing = body["data"].as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["available"], json!(2));
}
