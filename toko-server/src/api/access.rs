//! Content redemption handler
//!
//! GET /api/access/{token} exchanges an access token for the goods.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::access;
use crate::core::state::AppState;
use crate::error::{ApiResponse, ServiceError};

#[derive(Debug, Serialize)]
pub struct AccessView {
    pub order_id: String,
    pub product_title: String,
    pub content: String,
    pub usage_count: i64,
}

pub async fn redeem(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<AccessView>>, ServiceError> {
    let redeemed = access::redeem(&state.pool, &state.content_key, &token).await?;

    tracing::info!(
        order_id = %redeemed.order_id,
        usage_count = redeemed.usage_count,
        "Content redeemed"
    );

    Ok(Json(ApiResponse::success(AccessView {
        order_id: redeemed.order_id,
        product_title: redeemed.product_title,
        content: redeemed.content,
        usage_count: redeemed.usage_count,
    })))
}
