//! Storefront order handlers
//!
//! POST /api/orders               create order (PENDING)
//! GET  /api/orders/{id}          order status, polls the provider once
//! PUT  /api/orders/{id}/contact  set delivery contact
//! POST /api/orders/{id}/checkout create the provider transaction
//! POST /api/orders/{id}/sync     explicit reconciliation pull

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::state::AppState;
use crate::db::models::{Order, PaymentGateway, Product};
use crate::db::repository::{orders, products, stock};
use crate::error::{ApiResponse, AppError, ErrorCode, ServiceError};
use crate::gateway::{CheckoutArtifacts, CheckoutRequest};
use crate::reconcile::{self, ReconcileOutcome};
use crate::util::{new_id, now_millis};

// =============================================================================
// Request / Response types
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 50))]
    pub quantity: i64,
    /// midtrans | tripay | saweria
    pub gateway: String,
    #[validate(email)]
    pub customer_contact: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(email)]
    pub contact: String,
}

/// Customer-facing order projection. Stock item ids and the access
/// token stay server-side; the receipt email carries the access link.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub product_id: String,
    pub status: String,
    pub quantity: i64,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub payment_gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_contact: Option<String>,
    /// Stored checkout artifacts, when checkout already ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<CheckoutArtifacts>,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    pub created_at: i64,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        let checkout = o
            .checkout_payload
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            id: o.id.clone(),
            product_id: o.product_id.clone(),
            status: o.status.clone(),
            quantity: o.quantity,
            amount_due: o.amount_due,
            amount_paid: o.amount_paid,
            payment_gateway: o.payment_gateway.clone(),
            payment_method: o.payment_method.clone(),
            payment_ref: o.payment_ref.clone(),
            customer_contact: o.customer_contact.clone(),
            checkout,
            email_sent: o.email_sent,
            paid_at: o.paid_at,
            created_at: o.created_at,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_order(state: &AppState, id: &str) -> Result<Order, ServiceError> {
    orders::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ErrorCode::OrderNotFound.into())
}

async fn units_available(state: &AppState, product: &Product) -> Result<i64, ServiceError> {
    if product.is_legacy() {
        Ok(if product.is_sold { 0 } else { 1 })
    } else {
        Ok(stock::unsold_count(&state.pool, &product.id).await?)
    }
}

// =============================================================================
// POST /api/orders
// =============================================================================

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    req.validate().map_err(AppError::from)?;

    let gateway = PaymentGateway::from_db(&req.gateway).ok_or_else(|| {
        AppError::with_detail(ErrorCode::InvalidRequest, format!("unknown gateway {}", req.gateway))
    })?;

    let product = products::find_by_id(&state.pool, &req.product_id)
        .await?
        .ok_or(ErrorCode::ProductNotFound)?;
    if !product.is_active {
        return Err(ErrorCode::ProductInactive.into());
    }

    let available = units_available(&state, &product).await?;
    if available < req.quantity {
        return Err(AppError::with_detail(
            ErrorCode::ProductSoldOut,
            format!("{available} unit(s) left"),
        )
        .into());
    }

    let id = new_id();
    // Price captured now; later catalog edits never reprice an order
    let amount_due = product.price_idr * req.quantity;

    orders::create(
        &state.pool,
        orders::NewOrder {
            id: &id,
            product_id: &product.id,
            quantity: req.quantity,
            amount_due,
            payment_gateway: gateway.as_db(),
            customer_contact: req.customer_contact.as_deref(),
        },
        now_millis(),
    )
    .await?;

    tracing::info!(
        order_id = %id,
        product_id = %product.id,
        quantity = req.quantity,
        amount_due,
        gateway = %gateway,
        "Order created"
    );

    let order = load_order(&state, &id).await?;
    Ok(Json(ApiResponse::success(OrderView::from(&order))))
}

// =============================================================================
// GET /api/orders/{id}
// =============================================================================

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = load_order(&state, &id).await?;

    // One pull per page load once a provider transaction exists. A
    // provider hiccup must not blank the order page.
    if order.is_pending() && order.payment_ref.is_some() {
        if let Err(e) = reconcile::pull_and_reconcile(&state, &id).await {
            let e = AppError::from(e);
            tracing::warn!(order_id = %id, error = %e, "Status pull failed, serving stored state");
        }
    }

    let order = load_order(&state, &id).await?;
    Ok(Json(ApiResponse::success(OrderView::from(&order))))
}

// =============================================================================
// PUT /api/orders/{id}/contact
// =============================================================================

pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    req.validate().map_err(AppError::from)?;

    // Existence first, so unknown ids are 404 rather than 410
    let order = load_order(&state, &id).await?;
    if !orders::update_contact(&state.pool, &order.id, &req.contact, now_millis()).await? {
        return Err(ErrorCode::OrderExpired.into());
    }

    let order = load_order(&state, &id).await?;
    Ok(Json(ApiResponse::success(OrderView::from(&order))))
}

// =============================================================================
// POST /api/orders/{id}/checkout
// =============================================================================

pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CheckoutArtifacts>>, ServiceError> {
    let order = load_order(&state, &id).await?;

    if order.is_paid() {
        return Err(ErrorCode::OrderAlreadyPaid.into());
    }
    if !order.is_pending() {
        return Err(ErrorCode::OrderNotPending.into());
    }

    // Repeated checkout returns the stored instructions instead of
    // opening a second provider transaction
    if let Some(raw) = order.checkout_payload.as_deref() {
        let artifacts: CheckoutArtifacts = serde_json::from_str(raw)?;
        return Ok(Json(ApiResponse::success(artifacts)));
    }

    let gateway = order.gateway().ok_or_else(|| {
        let detail = format!("unknown gateway {}", order.payment_gateway);
        AppError::with_detail(ErrorCode::InvalidRequest, detail)
    })?;

    let product = products::find_by_id(&state.pool, &order.product_id)
        .await?
        .ok_or(ErrorCode::ProductNotFound)?;

    let artifacts = state
        .payments
        .checkout(
            gateway,
            CheckoutRequest {
                order_id: &order.id,
                amount_idr: order.amount_due,
                product_title: &product.title,
                customer_contact: order.customer_contact.as_deref(),
            },
        )
        .await
        .map_err(AppError::from)?;

    let payload = serde_json::to_string(&artifacts)?;
    orders::set_checkout(&state.pool, &order.id, &artifacts.reference, &payload, now_millis())
        .await?;

    tracing::info!(
        order_id = %order.id,
        gateway = %gateway,
        reference = %artifacts.reference,
        "Checkout created"
    );

    Ok(Json(ApiResponse::success(artifacts)))
}

// =============================================================================
// POST /api/orders/{id}/sync
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub outcome: &'static str,
    pub order: OrderView,
}

pub async fn sync(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SyncResponse>>, ServiceError> {
    let outcome = reconcile::pull_and_reconcile(&state, &id).await?;

    let outcome = match outcome {
        ReconcileOutcome::AlreadySettled => "already_settled",
        ReconcileOutcome::MarkedPaid { .. } => "paid",
        ReconcileOutcome::MarkedExpired => "expired",
        ReconcileOutcome::Acknowledged => "pending",
    };

    let order = load_order(&state, &id).await?;
    Ok(Json(ApiResponse::success(SyncResponse {
        outcome,
        order: OrderView::from(&order),
    })))
}
