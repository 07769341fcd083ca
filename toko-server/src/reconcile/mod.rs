//! Order reconciliation
//!
//! One algorithm serves both notification paths: provider webhooks
//! (push) and status polling (pull). Every follow-on effect of a
//! payment (stock allocation, cache invalidation, token issue, the
//! receipt email) is gated behind winning the PENDING -> PAID
//! conditional update, so concurrent deliveries of the same
//! confirmation collapse to one winner.

use crate::access;
use crate::core::state::AppState;
use crate::db::models::Order;
use crate::db::repository::{orders, products};
use crate::email::OrderReceipt;
use crate::error::{ErrorCode, ServiceError};
use crate::gateway::{NormalizedStatus, PaymentDetails};
use crate::inventory;
use crate::util::now_millis;

/// What a reconciliation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Already PAID with money recorded; at most the receipt email was
    /// repaired
    AlreadySettled,
    /// This call won the PENDING -> PAID transition
    MarkedPaid { allocated: usize, shortfall: i64 },
    /// This call closed the payment window
    MarkedExpired,
    /// No transition: still pending, or a concurrent writer was first
    Acknowledged,
}

/// Reconcile one order against a provider-reported status
pub async fn reconcile(
    state: &AppState,
    order_id: &str,
    status: NormalizedStatus,
    details: PaymentDetails,
) -> Result<ReconcileOutcome, ServiceError> {
    let order = orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or(ErrorCode::OrderNotFound)?;

    // Idempotent short-circuit: settled orders only ever need their
    // receipt email repaired.
    if order.is_settled() {
        repair_email(state, &order).await;
        return Ok(ReconcileOutcome::AlreadySettled);
    }

    match status {
        NormalizedStatus::Expired => {
            if orders::mark_expired_cas(&state.pool, &order.id, now_millis()).await? {
                tracing::info!(order_id = %order.id, "Order expired");
                Ok(ReconcileOutcome::MarkedExpired)
            } else {
                Ok(ReconcileOutcome::Acknowledged)
            }
        }
        NormalizedStatus::Pending => {
            // Keep whatever the provider already knows (channel, ref)
            orders::update_payment_meta(&state.pool, &order.id, meta(&details), now_millis())
                .await?;
            Ok(ReconcileOutcome::Acknowledged)
        }
        NormalizedStatus::Paid { amount_idr } => settle(state, &order, amount_idr, &details).await,
    }
}

/// Poll the order's provider and reconcile with whatever it reports
/// (the pull path; webhooks feed [`reconcile`] directly)
pub async fn pull_and_reconcile(
    state: &AppState,
    order_id: &str,
) -> Result<ReconcileOutcome, ServiceError> {
    let order = orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or(ErrorCode::OrderNotFound)?;

    if order.is_settled() {
        repair_email(state, &order).await;
        return Ok(ReconcileOutcome::AlreadySettled);
    }
    if !order.is_pending() {
        return Ok(ReconcileOutcome::Acknowledged);
    }

    let (status, details) = state
        .payments
        .poll_status(&order)
        .await
        .map_err(|e| ServiceError::App(e.into()))?;

    reconcile(state, order_id, status, details).await
}

async fn settle(
    state: &AppState,
    order: &Order,
    amount_idr: i64,
    details: &PaymentDetails,
) -> Result<ReconcileOutcome, ServiceError> {
    let won =
        orders::mark_paid_cas(&state.pool, &order.id, amount_idr, meta(details), now_millis())
            .await?;

    if !won {
        let current = orders::find_by_id(&state.pool, &order.id)
            .await?
            .ok_or(ErrorCode::OrderNotFound)?;
        if current.is_paid() {
            repair_email(state, &current).await;
            return Ok(ReconcileOutcome::AlreadySettled);
        }
        // Money confirmed for an order we already closed. Nothing to
        // transition; an operator has to sort the refund out.
        tracing::error!(
            order_id = %order.id,
            status = %current.status,
            amount_idr,
            "Payment confirmed for a terminal order, manual review required"
        );
        return Ok(ReconcileOutcome::Acknowledged);
    }

    tracing::info!(order_id = %order.id, amount_idr, "Order paid");

    // Follow-on work is best-effort: the payment is recorded and must
    // not be unwound by a failed side effect.
    let (allocated, shortfall) = finish_paid_order(state, order, amount_idr).await;

    Ok(ReconcileOutcome::MarkedPaid {
        allocated,
        shortfall,
    })
}

/// Allocation, cache invalidation, token issue and the receipt email.
/// Runs exactly once, inside the CAS winner.
async fn finish_paid_order(state: &AppState, order: &Order, amount_idr: i64) -> (usize, i64) {
    let product = match products::find_by_id(&state.pool, &order.product_id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            tracing::error!(
                order_id = %order.id,
                product_id = %order.product_id,
                "Paid order references a missing product"
            );
            return (0, order.quantity);
        }
        Err(e) => {
            tracing::error!(order_id = %order.id, error = %e, "Product load failed after payment");
            return (0, order.quantity);
        }
    };

    let (allocated, shortfall) =
        match inventory::allocate(&state.pool, &order.id, &product, order.quantity).await {
            Ok(allocation) => {
                if allocation.shortfall > 0 {
                    tracing::warn!(
                        order_id = %order.id,
                        shortfall = allocation.shortfall,
                        "Stock pool short, partial fulfillment"
                    );
                }
                if !allocation.stock_item_ids.is_empty() {
                    match serde_json::to_string(&allocation.stock_item_ids) {
                        Ok(json) => {
                            if let Err(e) =
                                orders::set_stock_items(&state.pool, &order.id, &json, now_millis())
                                    .await
                            {
                                tracing::error!(
                                    order_id = %order.id,
                                    error = %e,
                                    "Failed to record allocation"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                order_id = %order.id,
                                error = %e,
                                "Failed to encode allocation"
                            )
                        }
                    }
                }
                (allocation.allocated(), allocation.shortfall)
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Stock allocation failed");
                (0, order.quantity)
            }
        };

    // Sold counts changed; listings must not serve stale availability
    state.listing_cache.clear();

    // The access token exists from the moment the order is paid,
    // whether or not a receipt can be delivered
    if let Err(e) = access::ensure_token(&state.pool, &order.id).await {
        let e = crate::error::AppError::from(e);
        tracing::error!(order_id = %order.id, error = %e, "Access token issue failed");
    }

    deliver_receipt(state, order, &product.title, amount_idr).await;

    (allocated, shortfall)
}

/// One email attempt. Success flips `email_sent`; failure only logs,
/// the next reconciliation of a settled order retries.
async fn deliver_receipt(state: &AppState, order: &Order, product_title: &str, amount_idr: i64) {
    let Some(contact) = order.customer_contact.as_deref() else {
        tracing::debug!(order_id = %order.id, "No contact on order, receipt skipped");
        return;
    };

    let token = match access::ensure_token(&state.pool, &order.id).await {
        Ok(token) => token,
        Err(e) => {
            let e = crate::error::AppError::from(e);
            tracing::error!(order_id = %order.id, error = %e, "Access token issue failed");
            return;
        }
    };

    let access_url = format!("{}/access/{}", state.public_base_url, token.token);
    let receipt = OrderReceipt {
        order_id: &order.id,
        product_name: product_title,
        amount_idr,
        access_url: &access_url,
    };

    match state.mailer.send_order_receipt(contact, &receipt).await {
        Ok(()) => {
            if let Err(e) = orders::set_email_sent(&state.pool, &order.id, now_millis()).await {
                tracing::error!(
                    order_id = %order.id,
                    error = %e,
                    "Receipt sent but flag update failed"
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                order_id = %order.id,
                error = %e,
                "Receipt email failed, will retry on next reconciliation"
            );
        }
    }
}

/// Settled order, email still missing: retry the send
async fn repair_email(state: &AppState, order: &Order) {
    if order.email_sent || order.customer_contact.is_none() {
        return;
    }
    let product_title = match products::find_by_id(&state.pool, &order.product_id).await {
        Ok(Some(product)) => product.title,
        _ => order.product_id.clone(),
    };
    deliver_receipt(state, order, &product_title, order.amount_paid).await;
}

fn meta<'a>(details: &'a PaymentDetails) -> orders::PaymentMeta<'a> {
    orders::PaymentMeta {
        provider: details.provider.as_deref(),
        reference: details.reference.as_deref(),
        method: details.method.as_deref(),
        paid_time: details.paid_time.as_deref(),
    }
}
