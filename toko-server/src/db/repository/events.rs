use sqlx::SqlitePool;

use crate::db::models::WebhookEvent;

/// Append an inbound notification to the audit trail. Recorded for
/// every delivery, verified or not; deduplication is the order state
/// machine's job.
pub async fn record(
    pool: &SqlitePool,
    provider: &str,
    order_id: Option<&str>,
    raw_status: Option<&str>,
    verified: bool,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO webhook_events (provider, order_id, raw_status, verified, received_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(provider)
    .bind(order_id)
    .bind(raw_status)
    .bind(verified)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_order(
    pool: &SqlitePool,
    order_id: &str,
) -> Result<Vec<WebhookEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM webhook_events WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(pool)
        .await
}
