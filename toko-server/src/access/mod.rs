//! Access tokens and content redemption
//!
//! Every paid order gets exactly one unguessable token. Redemption is
//! rate limited through a conditional update on `last_accessed_at`, so
//! concurrent attempts inside the cooldown window collapse to one.

use sqlx::SqlitePool;

use crate::crypto::ContentKey;
use crate::db::models::AccessToken;
use crate::db::repository::{orders, products, stock, tokens};
use crate::error::{AppError, ErrorCode, ServiceError};
use crate::util::{generate_access_token, new_id, now_millis};

/// Minimum gap between two redemptions of the same token
pub const REDEEM_COOLDOWN_MS: i64 = 30_000;

/// Visible divider between units in a multi-item delivery
pub const CONTENT_SEPARATOR: &str = "\n--------------------\n";

/// Get or create the order's access token. Safe to call from
/// concurrent reconciliations; the UNIQUE(order_id) constraint picks
/// one winner and everyone reads the same row.
pub async fn ensure_token(pool: &SqlitePool, order_id: &str) -> Result<AccessToken, ServiceError> {
    let token = tokens::ensure(
        pool,
        &new_id(),
        order_id,
        &generate_access_token(),
        now_millis(),
    )
    .await?;
    Ok(token)
}

/// A successful redemption
#[derive(Debug)]
pub struct RedeemedContent {
    pub order_id: String,
    pub product_title: String,
    /// Decrypted units joined with [`CONTENT_SEPARATOR`]
    pub content: String,
    pub usage_count: i64,
}

/// Redeem a token for the delivered goods.
///
/// Rate limiting is distinct from invalidity: a cooldown hit returns
/// `RedeemCooldown` (429), while unknown tokens and unpaid orders all
/// collapse into `TokenInvalid` to keep the endpoint a poor oracle.
pub async fn redeem(
    pool: &SqlitePool,
    key: &ContentKey,
    token_value: &str,
) -> Result<RedeemedContent, ServiceError> {
    let token = tokens::find_by_token(pool, token_value)
        .await?
        .ok_or(ErrorCode::TokenInvalid)?;

    let order = orders::find_by_id(pool, &token.order_id)
        .await?
        .ok_or(ErrorCode::TokenInvalid)?;
    if !order.is_paid() {
        return Err(ErrorCode::TokenInvalid.into());
    }

    let claimed =
        tokens::claim_redeem_cas(pool, &token.id, now_millis(), REDEEM_COOLDOWN_MS).await?;
    if !claimed {
        return Err(ErrorCode::RedeemCooldown.into());
    }

    let product = products::find_by_id(pool, &order.product_id)
        .await?
        .ok_or(ErrorCode::ContentUnavailable)?;

    let content =
        assemble_content(pool, key, &order.id, &order.stock_ids(), &product.legacy_content)
            .await?;

    // Counted only after the content actually came together
    tokens::record_usage(pool, &token.id).await?;

    Ok(RedeemedContent {
        order_id: order.id,
        product_title: product.title,
        content,
        usage_count: token.usage_count + 1,
    })
}

/// Decrypt the allocated units in recorded order; fall back to the
/// legacy product payload when no pool items were recorded.
async fn assemble_content(
    pool: &SqlitePool,
    key: &ContentKey,
    order_id: &str,
    stock_ids: &[String],
    legacy_content: &Option<String>,
) -> Result<String, ServiceError> {
    if !stock_ids.is_empty() {
        let mut units = Vec::with_capacity(stock_ids.len());
        for item_id in stock_ids {
            let item = stock::find_by_id(pool, item_id).await?.ok_or_else(|| {
                tracing::error!(order_id, item_id, "Recorded stock item missing");
                AppError::new(ErrorCode::ContentUnavailable)
            })?;
            units.push(decrypt_unit(key, order_id, &item.content)?);
        }
        return Ok(units.join(CONTENT_SEPARATOR));
    }

    if let Some(blob) = legacy_content {
        return decrypt_unit(key, order_id, blob);
    }

    Err(ErrorCode::ContentUnavailable.into())
}

fn decrypt_unit(key: &ContentKey, order_id: &str, blob: &str) -> Result<String, ServiceError> {
    key.decrypt_string(blob).map_err(|e| {
        // Real reason stays in the log; the client sees a generic miss
        tracing::error!(order_id, error = e, "Stock payload decryption failed");
        AppError::new(ErrorCode::DecryptionFailed).into()
    })
}
