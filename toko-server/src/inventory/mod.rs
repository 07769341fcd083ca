//! Stock allocation for paid orders
//!
//! Allocation runs inside one transaction and claims each candidate
//! with a conditional update, so two orders can never walk away with
//! the same item. A short pool yields a partial allocation, not a
//! failure: the money already arrived.

use sqlx::SqlitePool;

use crate::db::models::Product;
use crate::db::repository::products;
use crate::util::now_millis;

/// What a claim attempt produced
#[derive(Debug, Clone)]
pub struct Allocation {
    /// Claimed item ids, allocation order (position, then id)
    pub stock_item_ids: Vec<String>,
    /// Units the pool could not cover
    pub shortfall: i64,
}

impl Allocation {
    pub fn allocated(&self) -> usize {
        self.stock_item_ids.len()
    }
}

/// Claim up to `quantity` unsold items for the order.
///
/// Legacy single-unit products have no pool; their claim is the
/// product-level sold flag and the payload stays on the product row.
pub async fn allocate(
    pool: &SqlitePool,
    order_id: &str,
    product: &Product,
    quantity: i64,
) -> Result<Allocation, sqlx::Error> {
    if product.is_legacy() {
        let claimed = products::mark_sold_cas(pool, &product.id, now_millis()).await?;
        if !claimed {
            // Oversold legacy unit. The payload is still deliverable,
            // so the order proceeds; flag it for the operator.
            tracing::warn!(
                order_id = order_id,
                product_id = %product.id,
                "Legacy product already claimed by another order"
            );
        }
        return Ok(Allocation {
            stock_item_ids: Vec::new(),
            shortfall: 0,
        });
    }

    let now = now_millis();
    let mut tx = pool.begin().await?;

    // First statement is a write so the transaction holds the database
    // write lock before candidates are read. Concurrent allocators then
    // serialize on the lock and each one selects from the latest
    // committed pool, instead of failing on a stale read snapshot
    // (SQLITE_BUSY_SNAPSHOT).
    sqlx::query("UPDATE products SET updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(&product.id)
        .execute(&mut *tx)
        .await?;

    let candidates: Vec<(String,)> = sqlx::query_as(
        "SELECT id FROM stock_items
         WHERE product_id = $1 AND is_sold = 0
         ORDER BY position, id
         LIMIT $2",
    )
    .bind(&product.id)
    .bind(quantity)
    .fetch_all(&mut *tx)
    .await?;

    let mut claimed = Vec::with_capacity(candidates.len());
    for (item_id,) in candidates {
        // The is_sold guard re-checks each row; anything already
        // claimed is silently skipped and counts toward the shortfall.
        let result = sqlx::query(
            "UPDATE stock_items SET is_sold = 1, sold_at = $1, order_id = $2, updated_at = $1
             WHERE id = $3 AND is_sold = 0",
        )
        .bind(now)
        .bind(order_id)
        .bind(&item_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 1 {
            claimed.push(item_id);
        }
    }

    // Keep the product's sold flag in sync with the pool
    sqlx::query(
        "UPDATE products SET
             is_sold = CASE WHEN EXISTS (
                 SELECT 1 FROM stock_items WHERE product_id = $1 AND is_sold = 0
             ) THEN 0 ELSE 1 END,
             updated_at = $2
         WHERE id = $1",
    )
    .bind(&product.id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let shortfall = quantity - claimed.len() as i64;
    Ok(Allocation {
        stock_item_ids: claimed,
        shortfall,
    })
}
