use sqlx::SqlitePool;

use crate::db::models::StockItem;

pub async fn add(
    pool: &SqlitePool,
    id: &str,
    product_id: &str,
    content: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    // Position is the append index within the product's pool
    sqlx::query(
        "INSERT INTO stock_items (id, product_id, content, position, is_sold, created_at, updated_at)
         VALUES ($1, $2, $3,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM stock_items WHERE product_id = $2),
                 0, $4, $4)",
    )
    .bind(id)
    .bind(product_id)
    .bind(content)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<StockItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM stock_items WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Admin view of a product's pool, allocation order
pub async fn list_for_product(
    pool: &SqlitePool,
    product_id: &str,
) -> Result<Vec<StockItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM stock_items WHERE product_id = $1 ORDER BY position, id")
        .bind(product_id)
        .fetch_all(pool)
        .await
}

pub async fn unsold_count(pool: &SqlitePool, product_id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM stock_items WHERE product_id = $1 AND is_sold = 0")
            .bind(product_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Replace an item's payload. Sold items are immutable; returns `false`
/// when the item is missing or already sold.
pub async fn update_content(
    pool: &SqlitePool,
    id: &str,
    content: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE stock_items SET content = $1, updated_at = $2 WHERE id = $3 AND is_sold = 0",
    )
    .bind(content)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Delete an unsold item. Sold items stay forever; they are part of a
/// customer's purchase record.
pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM stock_items WHERE id = $1 AND is_sold = 0")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
