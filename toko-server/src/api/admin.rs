//! Admin API: catalog and stock management, order overview
//!
//! Guarded by the `X-Admin-Key` shared secret; plaintext stock content
//! is encrypted on the way in and never served back out.

use axum::Json;
use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::state::AppState;
use crate::db::models::{Order, Product, StockItem, WebhookEvent};
use crate::db::repository::{events, orders, products, stock};
use crate::error::{ApiResponse, AppError, ErrorCode, ServiceError};
use crate::util::{constant_time_eq, new_id, now_millis};

/// Middleware comparing `X-Admin-Key` against the configured secret
pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let provided = request
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !constant_time_eq(provided.as_bytes(), state.admin_api_key.as_bytes()) {
        return Err(AppError::new(ErrorCode::NotAuthenticated).into_response());
    }

    Ok(next.run(request).await)
}

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AdminProductView {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub price_idr: i64,
    pub is_active: bool,
    pub is_sold: bool,
    pub is_legacy: bool,
    pub unsold_stock: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AdminProductView {
    fn new(p: &Product, unsold_stock: i64) -> Self {
        Self {
            id: p.id.clone(),
            slug: p.slug.clone(),
            title: p.title.clone(),
            description: p.description.clone(),
            price_idr: p.price_idr,
            is_active: p.is_active,
            is_sold: p.is_sold,
            is_legacy: p.is_legacy(),
            unsold_stock,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Stock row without its payload; content never leaves the store
#[derive(Debug, Serialize)]
pub struct AdminStockView {
    pub id: String,
    pub product_id: String,
    pub position: i64,
    pub is_sold: bool,
    pub sold_at: Option<i64>,
    pub order_id: Option<String>,
    pub created_at: i64,
}

impl From<&StockItem> for AdminStockView {
    fn from(item: &StockItem) -> Self {
        Self {
            id: item.id.clone(),
            product_id: item.product_id.clone(),
            position: item.position,
            is_sold: item.is_sold,
            sold_at: item.sold_at,
            order_id: item.order_id.clone(),
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminOrderView {
    pub id: String,
    pub product_id: String,
    pub status: String,
    pub quantity: i64,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub payment_gateway: String,
    pub payment_provider: Option<String>,
    pub payment_ref: Option<String>,
    pub payment_method: Option<String>,
    pub payment_time: Option<String>,
    pub customer_contact: Option<String>,
    pub stock_item_ids: Vec<String>,
    pub email_sent: bool,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Order> for AdminOrderView {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id.clone(),
            product_id: o.product_id.clone(),
            status: o.status.clone(),
            quantity: o.quantity,
            amount_due: o.amount_due,
            amount_paid: o.amount_paid,
            payment_gateway: o.payment_gateway.clone(),
            payment_provider: o.payment_provider.clone(),
            payment_ref: o.payment_ref.clone(),
            payment_method: o.payment_method.clone(),
            payment_time: o.payment_time.clone(),
            customer_contact: o.customer_contact.clone(),
            stock_item_ids: o.stock_ids(),
            email_sent: o.email_sent,
            paid_at: o.paid_at,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookEventView {
    pub id: i64,
    pub provider: String,
    pub raw_status: Option<String>,
    pub verified: bool,
    pub received_at: i64,
}

impl From<&WebhookEvent> for WebhookEventView {
    fn from(e: &WebhookEvent) -> Self {
        Self {
            id: e.id,
            provider: e.provider.clone(),
            raw_status: e.raw_status.clone(),
            verified: e.verified,
            received_at: e.received_at,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64))]
    pub slug: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_idr: i64,
    /// Plaintext payload for a legacy single-unit product
    pub legacy_content: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_idr: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    /// Plaintext units, stored encrypted in insertion order
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub content: String,
}

fn encrypt_payload(state: &AppState, plaintext: &str) -> Result<String, ServiceError> {
    state
        .content_key
        .encrypt_string(plaintext)
        .map_err(|e| AppError::with_detail(ErrorCode::InternalError, e).into())
}

fn valid_slug(slug: &str) -> bool {
    slug.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// =============================================================================
// GET /api/admin/products
// =============================================================================

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AdminProductView>>>, ServiceError> {
    let all = products::list_all(&state.pool).await?;
    let pool_counts = products::unsold_counts(&state.pool).await?;

    let views = all
        .iter()
        .map(|p| AdminProductView::new(p, *pool_counts.get(&p.id).unwrap_or(&0)))
        .collect();
    Ok(Json(ApiResponse::success(views)))
}

// =============================================================================
// POST /api/admin/products
// =============================================================================

pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<Json<ApiResponse<AdminProductView>>, ServiceError> {
    req.validate().map_err(AppError::from)?;
    if !valid_slug(&req.slug) {
        return Err(AppError::with_detail(
            ErrorCode::ValidationFailed,
            "slug must be lowercase alphanumeric with dashes",
        )
        .into());
    }
    if products::find_by_slug(&state.pool, &req.slug).await?.is_some() {
        return Err(AppError::with_detail(ErrorCode::AlreadyExists, "slug taken").into());
    }

    let legacy_encrypted = match req.legacy_content.as_deref() {
        Some(plain) => Some(encrypt_payload(&state, plain)?),
        None => None,
    };

    let id = new_id();
    products::create(
        &state.pool,
        products::NewProduct {
            id: &id,
            slug: &req.slug,
            title: &req.title,
            description: req.description.as_deref(),
            price_idr: req.price_idr,
            legacy_content: legacy_encrypted.as_deref(),
        },
        now_millis(),
    )
    .await?;

    state.listing_cache.clear();
    tracing::info!(product_id = %id, slug = %req.slug, "Product created");

    let product = products::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::ProductNotFound)?;
    Ok(Json(ApiResponse::success(AdminProductView::new(&product, 0))))
}

// =============================================================================
// PUT /api/admin/products/{id}
// =============================================================================

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<AdminProductView>>, ServiceError> {
    req.validate().map_err(AppError::from)?;

    products::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::ProductNotFound)?;

    products::update(
        &state.pool,
        &id,
        products::ProductPatch {
            title: req.title.as_deref(),
            description: req.description.as_deref(),
            price_idr: req.price_idr,
            is_active: req.is_active,
        },
        now_millis(),
    )
    .await?;

    state.listing_cache.clear();
    tracing::info!(product_id = %id, "Product updated");

    let product = products::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::ProductNotFound)?;
    let unsold = stock::unsold_count(&state.pool, &id).await?;
    Ok(Json(ApiResponse::success(AdminProductView::new(&product, unsold))))
}

// =============================================================================
// GET /api/admin/products/{id}/stock
// =============================================================================

pub async fn list_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<AdminStockView>>>, ServiceError> {
    products::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::ProductNotFound)?;

    let items = stock::list_for_product(&state.pool, &id).await?;
    Ok(Json(ApiResponse::success(
        items.iter().map(AdminStockView::from).collect(),
    )))
}

// =============================================================================
// POST /api/admin/products/{id}/stock
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AddStockResponse {
    pub added: usize,
}

pub async fn add_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddStockRequest>,
) -> Result<Json<ApiResponse<AddStockResponse>>, ServiceError> {
    if req.items.is_empty() || req.items.iter().any(|s| s.trim().is_empty()) {
        return Err(
            AppError::with_detail(ErrorCode::ValidationFailed, "items must be non-empty").into(),
        );
    }

    let product = products::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::ProductNotFound)?;
    if product.is_legacy() {
        return Err(AppError::with_detail(
            ErrorCode::InvalidRequest,
            "legacy product carries its payload on the product row",
        )
        .into());
    }

    for plain in &req.items {
        let encrypted = encrypt_payload(&state, plain)?;
        stock::add(&state.pool, &new_id(), &product.id, &encrypted, now_millis()).await?;
    }

    // New stock can revive a sold-out product
    products::refresh_sold_flag(&state.pool, &product.id, now_millis()).await?;

    state.listing_cache.clear();
    tracing::info!(product_id = %product.id, added = req.items.len(), "Stock added");

    Ok(Json(ApiResponse::success(AddStockResponse {
        added: req.items.len(),
    })))
}

// =============================================================================
// PUT /api/admin/stock/{id}
// =============================================================================

pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStockRequest>,
) -> Result<Json<ApiResponse<AdminStockView>>, ServiceError> {
    if req.content.trim().is_empty() {
        return Err(
            AppError::with_detail(ErrorCode::ValidationFailed, "content must be non-empty").into(),
        );
    }

    let item = stock::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::StockItemNotFound)?;

    let encrypted = encrypt_payload(&state, &req.content)?;
    if !stock::update_content(&state.pool, &item.id, &encrypted, now_millis()).await? {
        // The only way the guarded update misses an existing row
        return Err(ErrorCode::StockItemSold.into());
    }

    state.listing_cache.clear();

    let item = stock::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::StockItemNotFound)?;
    Ok(Json(ApiResponse::success(AdminStockView::from(&item))))
}

// =============================================================================
// DELETE /api/admin/stock/{id}
// =============================================================================

pub async fn delete_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ServiceError> {
    let item = stock::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::StockItemNotFound)?;

    if !stock::delete(&state.pool, &item.id).await? {
        return Err(ErrorCode::StockItemSold.into());
    }

    products::refresh_sold_flag(&state.pool, &item.product_id, now_millis()).await?;

    state.listing_cache.clear();
    tracing::info!(stock_id = %item.id, product_id = %item.product_id, "Stock item deleted");

    Ok(Json(ApiResponse::success(true)))
}

// =============================================================================
// GET /api/admin/orders
// =============================================================================

pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AdminOrderView>>>, ServiceError> {
    let recent = orders::list_recent(&state.pool, 200).await?;
    Ok(Json(ApiResponse::success(
        recent.iter().map(AdminOrderView::from).collect(),
    )))
}

// =============================================================================
// GET /api/admin/orders/{id}
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AdminOrderDetail {
    pub order: AdminOrderView,
    /// Inbound notification audit trail, oldest first
    pub events: Vec<WebhookEventView>,
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AdminOrderDetail>>, ServiceError> {
    let order = orders::find_by_id(&state.pool, &id)
        .await?
        .ok_or(ErrorCode::OrderNotFound)?;
    let trail = events::list_for_order(&state.pool, &id).await?;

    Ok(Json(ApiResponse::success(AdminOrderDetail {
        order: AdminOrderView::from(&order),
        events: trail.iter().map(WebhookEventView::from).collect(),
    })))
}
