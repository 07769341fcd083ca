use sqlx::SqlitePool;

use crate::db::models::Order;

pub struct NewOrder<'a> {
    pub id: &'a str,
    pub product_id: &'a str,
    pub quantity: i64,
    /// Unit price at creation time x quantity. Provider lookups keyed
    /// by amount use this figure, not the live product price.
    pub amount_due: i64,
    pub payment_gateway: &'a str,
    pub customer_contact: Option<&'a str>,
}

/// Provider-reported payment metadata. `None` fields leave the stored
/// value untouched (COALESCE merge).
#[derive(Default)]
pub struct PaymentMeta<'a> {
    pub provider: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub method: Option<&'a str>,
    pub paid_time: Option<&'a str>,
}

pub async fn create(pool: &SqlitePool, o: NewOrder<'_>, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, product_id, status, quantity, amount_due, amount_paid,
                             payment_gateway, customer_contact, email_sent, created_at, updated_at)
         VALUES ($1, $2, 'PENDING', $3, $4, 0, $5, $6, 0, $7, $7)",
    )
    .bind(o.id)
    .bind(o.product_id)
    .bind(o.quantity)
    .bind(o.amount_due)
    .bind(o.payment_gateway)
    .bind(o.customer_contact)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Admin listing, newest first
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC LIMIT $1")
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Update the delivery contact. Refused once the order is EXPIRED.
pub async fn update_contact(
    pool: &SqlitePool,
    id: &str,
    contact: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET customer_contact = $1, updated_at = $2
         WHERE id = $3 AND status != 'EXPIRED'",
    )
    .bind(contact)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Persist checkout artifacts returned by the gateway
pub async fn set_checkout(
    pool: &SqlitePool,
    id: &str,
    reference: &str,
    payload_json: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET payment_ref = $1, checkout_payload = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(reference)
    .bind(payload_json)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// PENDING -> PAID transition. The WHERE clause is the concurrency
/// gate: exactly one caller observes `true`, everyone else loses the
/// race and must reload.
pub async fn mark_paid_cas(
    pool: &SqlitePool,
    id: &str,
    amount_paid: i64,
    meta: PaymentMeta<'_>,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET
             status = 'PAID',
             amount_paid = $1,
             paid_at = $2,
             updated_at = $2,
             payment_provider = COALESCE($3, payment_provider),
             payment_ref = COALESCE($4, payment_ref),
             payment_method = COALESCE($5, payment_method),
             payment_time = COALESCE($6, payment_time)
         WHERE id = $7 AND status = 'PENDING'",
    )
    .bind(amount_paid)
    .bind(now)
    .bind(meta.provider)
    .bind(meta.reference)
    .bind(meta.method)
    .bind(meta.paid_time)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// PENDING -> EXPIRED transition, same conditional-update gate
pub async fn mark_expired_cas(pool: &SqlitePool, id: &str, now: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'EXPIRED', updated_at = $1
         WHERE id = $2 AND status = 'PENDING'",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Merge provider metadata without touching the status (used when the
/// provider reports details on a still-unpaid order)
pub async fn update_payment_meta(
    pool: &SqlitePool,
    id: &str,
    meta: PaymentMeta<'_>,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET
             payment_provider = COALESCE($1, payment_provider),
             payment_ref = COALESCE($2, payment_ref),
             payment_method = COALESCE($3, payment_method),
             payment_time = COALESCE($4, payment_time),
             updated_at = $5
         WHERE id = $6",
    )
    .bind(meta.provider)
    .bind(meta.reference)
    .bind(meta.method)
    .bind(meta.paid_time)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record the allocated stock item ids (JSON array, allocation order)
pub async fn set_stock_items(
    pool: &SqlitePool,
    id: &str,
    ids_json: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET stock_item_ids = $1, updated_at = $2 WHERE id = $3")
        .bind(ids_json)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark the receipt email as delivered. Only set after the mailer
/// confirms the send.
pub async fn set_email_sent(pool: &SqlitePool, id: &str, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET email_sent = 1, updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
