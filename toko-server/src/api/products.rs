//! Storefront catalog handlers
//!
//! GET /api/products        active catalog with live availability (cached)
//! GET /api/products/{slug} product detail (cached)

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::state::AppState;
use crate::db::models::Product;
use crate::db::repository::{products, stock};
use crate::error::{ApiResponse, ErrorCode, ServiceError};

const LISTING_KEY: &str = "listing";

/// Customer-facing product projection. Encrypted payloads never leave
/// the row; availability is computed, not stored.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductView {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub price_idr: i64,
    /// Units still purchasable (1/0 for legacy products)
    pub available: i64,
}

fn detail_key(slug: &str) -> String {
    format!("product:{slug}")
}

fn availability(product: &Product, pool_counts: &HashMap<String, i64>) -> i64 {
    if product.is_legacy() {
        if product.is_sold { 0 } else { 1 }
    } else {
        *pool_counts.get(&product.id).unwrap_or(&0)
    }
}

fn view(product: &Product, available: i64) -> ProductView {
    ProductView {
        id: product.id.clone(),
        slug: product.slug.clone(),
        title: product.title.clone(),
        description: product.description.clone(),
        price_idr: product.price_idr,
        available,
    }
}

/// GET /api/products
pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    if let Some(cached) = state.listing_cache.get(LISTING_KEY) {
        return Ok(Json(ApiResponse::success(cached)));
    }

    let all = products::list_active(&state.pool).await?;
    let pool_counts = products::unsold_counts(&state.pool).await?;

    // Sold-out products drop off the storefront
    let listing: Vec<ProductView> = all
        .iter()
        .map(|p| view(p, availability(p, &pool_counts)))
        .filter(|v| v.available > 0)
        .collect();

    let value = serde_json::to_value(&listing)?;
    state.listing_cache.put(LISTING_KEY, value.clone());
    Ok(Json(ApiResponse::success(value)))
}

/// GET /api/products/{slug}
pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    let key = detail_key(&slug);
    if let Some(cached) = state.listing_cache.get(&key) {
        return Ok(Json(ApiResponse::success(cached)));
    }

    let product = products::find_by_slug(&state.pool, &slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or(ErrorCode::ProductNotFound)?;

    let available = if product.is_legacy() {
        if product.is_sold { 0 } else { 1 }
    } else {
        stock::unsold_count(&state.pool, &product.id).await?
    };

    let value = serde_json::to_value(view(&product, available))?;
    state.listing_cache.put(key, value.clone());
    Ok(Json(ApiResponse::success(value)))
}
