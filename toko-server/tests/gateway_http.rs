//! Provider HTTP integrations against a mock server: checkout
//! artifacts, idempotent re-checkout and the polling pull path

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::{Value, json};
use tower::ServiceExt;

use toko_server::api;
use toko_server::core::state::AppState;
use toko_server::gateway::PaymentHub;
use toko_server::gateway::midtrans::Midtrans;
use toko_server::gateway::saweria::Saweria;
use toko_server::gateway::tripay::Tripay;

use support::{seed_order, seed_product, seed_stock, state_with_hub};

async fn call(
    state: &AppState,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
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
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn midtrans_hub(base_url: &str) -> PaymentHub {
    PaymentHub {
        midtrans: Some(Midtrans::new(reqwest::Client::new(), "server-key", base_url)),
        tripay: None,
        saweria: None,
    }
}

fn tripay_hub(base_url: &str) -> PaymentHub {
    PaymentHub {
        midtrans: None,
        tripay: Some(Tripay::new(
            reqwest::Client::new(),
            "api-key",
            "private-key",
            "T0001",
            base_url,
        )),
        saweria: None,
    }
}

#[tokio::test]
async fn test_midtrans_checkout_is_created_once() {
    let server = MockServer::start_async().await;
    let snap = server.mock(|when, then| {
        when.method(POST).path("/snap/v1/transactions");
        then.status(201).json_body(json!({
            "token": "snap-token",
            "redirect_url": "https://app.sandbox.midtrans.com/snap/v4/redirection/snap-token",
        }));
    });

    let (state, _mailer) = state_with_hub(midtrans_hub(&server.url(""))).await;
    let product_id = seed_product(&state.pool, "ebook", 50_000).await;
    seed_stock(&state, &product_id, &["KEY-A"]).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/orders",
        Some(json!({
            "product_id": product_id,
            "gateway": "midtrans",
            "customer_contact": "buyer@example.com",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("PENDING"));
    assert_eq!(body["data"]["amount_due"], json!(50_000));
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) =
        call(&state, "POST", &format!("/api/orders/{order_id}/checkout"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["pay_url"],
        json!("https://app.sandbox.midtrans.com/snap/v4/redirection/snap-token")
    );
    assert_eq!(body["data"]["reference"], json!(order_id));
    snap.assert_async().await;

    // Second checkout serves the stored artifacts, no second Snap call
    let (status, body) =
        call(&state, "POST", &format!("/api/orders/{order_id}/checkout"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reference"], json!(order_id));
    assert_eq!(snap.hits_async().await, 1);
}

#[tokio::test]
async fn test_tripay_checkout_then_poll_settles_the_order() {
    let server = MockServer::start_async().await;
    let create = server.mock(|when, then| {
        when.method(POST).path("/transaction/create");
        then.status(200).json_body(json!({
            "success": true,
            "data": {
                "reference": "T-REF-1",
                "checkout_url": "https://tripay.co.id/checkout/T-REF-1",
                "qr_string": "000201QRIS",
                "expired_time": 1755250000,
            },
        }));
    });
    let detail = server.mock(|when, then| {
        when.method(GET)
            .path("/transaction/detail")
            .query_param("reference", "T-REF-1");
        then.status(200).json_body(json!({
            "success": true,
            "data": {
                "reference": "T-REF-1",
                "status": "PAID",
                "amount_received": 50000,
                "payment_method": "QRIS",
                "paid_at": 1755242400,
            },
        }));
    });

    let (state, _mailer) = state_with_hub(tripay_hub(&server.url(""))).await;
    let product_id = seed_product(&state.pool, "ebook", 50_000).await;
    seed_stock(&state, &product_id, &["KEY-A"]).await;
    let order_id = seed_order(&state.pool, &product_id, 1, 50_000, "tripay", None).await;

    let (status, body) =
        call(&state, "POST", &format!("/api/orders/{order_id}/checkout"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reference"], json!("T-REF-1"));
    assert_eq!(body["data"]["qr_string"], json!("000201QRIS"));
    create.assert_async().await;

    // The status page poll picks the settlement up
    let (status, body) = call(&state, "GET", &format!("/api/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("PAID"));
    assert_eq!(body["data"]["amount_paid"], json!(50_000));
    detail.assert_async().await;

    // Settled orders are not polled again
    let (_, body) = call(&state, "GET", &format!("/api/orders/{order_id}"), None).await;
    assert_eq!(body["data"]["status"], json!("PAID"));
    assert_eq!(detail.hits_async().await, 1);
}

#[tokio::test]
async fn test_sync_reports_pending_while_unpaid() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/transaction/detail");
        then.status(200).json_body(json!({
            "success": true,
            "data": { "reference": "T-REF-2", "status": "UNPAID", "amount": 50000 },
        }));
    });

    let (state, _mailer) = state_with_hub(tripay_hub(&server.url(""))).await;
    let product_id = seed_product(&state.pool, "ebook", 50_000).await;
    let order_id = seed_order(&state.pool, &product_id, 1, 50_000, "tripay", None).await;
    sqlx::query("UPDATE orders SET payment_ref = 'T-REF-2' WHERE id = $1")
        .bind(&order_id)
        .execute(&state.pool)
        .await
        .unwrap();

    let (status, body) = call(&state, "POST", &format!("/api/orders/{order_id}/sync"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], json!("pending"));
    assert_eq!(body["data"]["order"]["status"], json!("PENDING"));
}

#[tokio::test]
async fn test_midtrans_unrecorded_transaction_polls_as_pending() {
    let server = MockServer::start_async().await;
    let (state, _mailer) = state_with_hub(midtrans_hub(&server.url(""))).await;
    let product_id = seed_product(&state.pool, "ebook", 50_000).await;
    let order_id = seed_order(&state.pool, &product_id, 1, 50_000, "midtrans", None).await;

    // Midtrans answers 404 as a JSON body until the customer opens Snap
    server.mock(|when, then| {
        when.method(GET).path(format!("/v2/{order_id}/status"));
        then.status(404)
            .json_body(json!({
                "status_code": "404",
                "status_message": "Transaction doesn't exist.",
            }));
    });

    let (status, body) = call(&state, "POST", &format!("/api/orders/{order_id}/sync"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], json!("pending"));
}

#[tokio::test]
async fn test_rejected_create_surfaces_as_gateway_failure() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/transaction/create");
        then.status(400).json_body(json!({
            "success": false,
            "message": "Merchant is not active",
        }));
    });

    let (state, _mailer) = state_with_hub(tripay_hub(&server.url(""))).await;
    let product_id = seed_product(&state.pool, "ebook", 50_000).await;
    let order_id = seed_order(&state.pool, &product_id, 1, 50_000, "tripay", None).await;

    let (status, body) =
        call(&state, "POST", &format!("/api/orders/{order_id}/checkout"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], json!(false));

    // Nothing stored; the next attempt may still succeed
    let order = toko_server::db::repository::orders::find_by_id(&state.pool, &order_id)
        .await
        .unwrap()
        .unwrap();
    assert!(order.checkout_payload.is_none());
    assert!(order.payment_ref.is_none());
}

#[tokio::test]
async fn test_saweria_checkout_needs_no_provider_call() {
    let hub = PaymentHub {
        midtrans: None,
        tripay: None,
        saweria: Some(Saweria::new(
            reqwest::Client::new(),
            "stream-key",
            "tokodigital",
            "https://saweria.co",
        )),
    };
    let (state, _mailer) = state_with_hub(hub).await;
    let product_id = seed_product(&state.pool, "ebook", 50_000).await;
    seed_stock(&state, &product_id, &["KEY-A"]).await;
    let order_id = seed_order(&state.pool, &product_id, 1, 50_000, "saweria", None).await;

    let (status, body) =
        call(&state, "POST", &format!("/api/orders/{order_id}/checkout"), None).await;
    assert_eq!(status, StatusCode::OK);
    let pay_url = body["data"]["pay_url"].as_str().unwrap();
    assert_eq!(
        pay_url,
        &format!("https://saweria.co/tokodigital?amount=50000&message={order_id}")
    );
    assert_eq!(body["data"]["pay_code"], json!(order_id));
}
