//! API routes for the storefront server

pub mod access;
pub mod admin;
pub mod health;
pub mod orders;
pub mod products;
pub mod webhooks;

use axum::routing::{get, post, put};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Storefront (no auth; order ids are unguessable capabilities)
    let storefront = Router::new()
        .route("/api/products", get(products::list))
        .route("/api/products/{slug}", get(products::get_by_slug))
        .route("/api/orders", post(orders::create))
        .route("/api/orders/{id}", get(orders::get_by_id))
        .route("/api/orders/{id}/contact", put(orders::update_contact))
        .route("/api/orders/{id}/checkout", post(orders::checkout))
        .route("/api/orders/{id}/sync", post(orders::sync))
        .route("/api/access/{token}", get(access::redeem));

    // Provider callbacks (signature-verified, raw body)
    let callbacks = Router::new()
        .route("/api/webhooks/midtrans", post(webhooks::midtrans))
        .route("/api/webhooks/tripay", post(webhooks::tripay))
        .route("/api/webhooks/saweria", post(webhooks::saweria));

    // Admin (shared API key)
    let admin = Router::new()
        .route(
            "/api/admin/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route("/api/admin/products/{id}", put(admin::update_product))
        .route(
            "/api/admin/products/{id}/stock",
            get(admin::list_stock).post(admin::add_stock),
        )
        .route(
            "/api/admin/stock/{id}",
            put(admin::update_stock).delete(admin::delete_stock),
        )
        .route("/api/admin/orders", get(admin::list_orders))
        .route("/api/admin/orders/{id}", get(admin::get_order))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin_key,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(storefront)
        .merge(callbacks)
        .merge(admin)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
