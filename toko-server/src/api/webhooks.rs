//! Payment provider webhook handlers
//!
//! POST /api/webhooks/midtrans: signature digest embedded in the body
//! POST /api/webhooks/tripay:   X-Callback-Signature over the raw body
//! POST /api/webhooks/saweria:  Saweria-Callback-Signature over canonical fields
//!
//! All three must receive the raw body (not JSON) because the
//! signatures cover the bytes on the wire. Every delivery lands in the
//! audit trail; the order state machine makes duplicates harmless.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::core::state::AppState;
use crate::db::repository::{events, orders};
use crate::error::{AppError, ErrorCode, ServiceError};
use crate::gateway::{GatewayError, NormalizedEvent, NormalizedStatus};
use crate::reconcile;
use crate::util::now_millis;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// =============================================================================
// POST /api/webhooks/midtrans
// =============================================================================

pub async fn midtrans(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let Some(gw) = state.payments.midtrans.as_ref() else {
        tracing::warn!("Midtrans webhook received but gateway not configured");
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    match gw.parse_notification(&body) {
        Ok(event) => process_event(&state, "midtrans", event).await,
        Err(e) => reject(&state, "midtrans", e).await,
    }
}

// =============================================================================
// POST /api/webhooks/tripay
// =============================================================================

pub async fn tripay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(gw) = state.payments.tripay.as_ref() else {
        tracing::warn!("Tripay webhook received but gateway not configured");
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    let Some(signature) = header_str(&headers, "x-callback-signature") else {
        tracing::warn!("Missing X-Callback-Signature header");
        return StatusCode::BAD_REQUEST;
    };

    match gw.parse_notification(&body, signature) {
        Ok(event) => process_event(&state, "tripay", event).await,
        Err(e) => reject(&state, "tripay", e).await,
    }
}

// =============================================================================
// POST /api/webhooks/saweria
// =============================================================================

pub async fn saweria(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(gw) = state.payments.saweria.as_ref() else {
        tracing::warn!("Saweria webhook received but gateway not configured");
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    let Some(signature) = header_str(&headers, "saweria-callback-signature") else {
        tracing::warn!("Missing Saweria-Callback-Signature header");
        return StatusCode::BAD_REQUEST;
    };

    let event = match gw.parse_notification(&body, signature) {
        Ok(event) => event,
        Err(e) => return reject(&state, "saweria", e).await,
    };

    // The order code arrives in donor-typed free text, so amount
    // equality is part of verification: a donation that does not match
    // the order's amount_due is never treated as its payment.
    let order = match orders::find_by_id(&state.pool, &event.order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            tracing::warn!(order_id = %event.order_id, "Donation references an unknown order");
            let _ = events::record(
                &state.pool,
                "saweria",
                Some(&event.order_id),
                Some(&event.raw_status),
                false,
                now_millis(),
            )
            .await;
            return StatusCode::NOT_FOUND;
        }
        Err(e) => {
            tracing::error!(error = %e, "DB error loading order for donation check");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if let NormalizedStatus::Paid { amount_idr } = event.status
        && amount_idr != order.amount_due
    {
        tracing::warn!(
            order_id = %event.order_id,
            reported = amount_idr,
            expected = order.amount_due,
            "Donation amount mismatch"
        );
        let _ = events::record(
            &state.pool,
            "saweria",
            Some(&event.order_id),
            Some(&event.raw_status),
            false,
            now_millis(),
        )
        .await;
        return StatusCode::BAD_REQUEST;
    }

    process_event(&state, "saweria", event).await
}

// =============================================================================
// Shared tail
// =============================================================================

/// Audit the verified event, then run it through reconciliation.
/// Duplicates and late deliveries come back `AlreadySettled` or
/// `Acknowledged` and are answered 200 like first deliveries.
async fn process_event(state: &AppState, provider: &str, event: NormalizedEvent) -> StatusCode {
    tracing::info!(
        provider,
        order_id = %event.order_id,
        raw_status = %event.raw_status,
        "Webhook received"
    );

    let _ = events::record(
        &state.pool,
        provider,
        Some(&event.order_id),
        Some(&event.raw_status),
        true,
        now_millis(),
    )
    .await;

    match reconcile::reconcile(state, &event.order_id, event.status, event.details).await {
        Ok(outcome) => {
            tracing::debug!(provider, ?outcome, "Webhook reconciled");
            StatusCode::OK
        }
        Err(ServiceError::App(e)) if e.code == ErrorCode::OrderNotFound => {
            tracing::warn!(provider, "Webhook for unknown order");
            StatusCode::NOT_FOUND
        }
        Err(e) => {
            let e = AppError::from(e);
            tracing::error!(provider, error = %e, "Webhook reconciliation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Unverifiable delivery: log it, audit it, refuse it. Bad signatures
/// are 401, everything else unparseable is 400.
async fn reject(state: &AppState, provider: &str, e: GatewayError) -> StatusCode {
    let status = match &e {
        GatewayError::BadSignature => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_REQUEST,
    };
    tracing::warn!(provider, error = %e, "Webhook rejected");
    let _ = events::record(&state.pool, provider, None, None, false, now_millis()).await;
    status
}
