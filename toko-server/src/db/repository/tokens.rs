use sqlx::SqlitePool;

use crate::db::models::AccessToken;

/// Create the order's access token if none exists, then return the
/// stored row. The UNIQUE(order_id) constraint makes this idempotent
/// under concurrent callers: losers of the insert race read the
/// winner's token.
pub async fn ensure(
    pool: &SqlitePool,
    id: &str,
    order_id: &str,
    token: &str,
    now: i64,
) -> Result<AccessToken, sqlx::Error> {
    sqlx::query(
        "INSERT INTO access_tokens (id, order_id, token, usage_count, created_at)
         VALUES ($1, $2, $3, 0, $4)
         ON CONFLICT(order_id) DO NOTHING",
    )
    .bind(id)
    .bind(order_id)
    .bind(token)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM access_tokens WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
}

pub async fn find_by_token(
    pool: &SqlitePool,
    token: &str,
) -> Result<Option<AccessToken>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM access_tokens WHERE token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_order(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Option<AccessToken>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM access_tokens WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await
}

/// Claim a redemption slot. The conditional update enforces the
/// cooldown: `true` means the caller owns this attempt, `false` means
/// another redemption ran inside the window.
pub async fn claim_redeem_cas(
    pool: &SqlitePool,
    id: &str,
    now: i64,
    cooldown_ms: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE access_tokens SET last_accessed_at = $1
         WHERE id = $2 AND (last_accessed_at IS NULL OR last_accessed_at <= $3)",
    )
    .bind(now)
    .bind(id)
    .bind(now - cooldown_ms)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Count a delivered redemption. Called only after content assembly
/// succeeded.
pub async fn record_usage(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE access_tokens SET usage_count = usage_count + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
