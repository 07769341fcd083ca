use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::models::Product;

/// Fields for a new catalog entry
pub struct NewProduct<'a> {
    pub id: &'a str,
    pub slug: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub price_idr: i64,
    /// Encrypted blob for single-unit legacy products
    pub legacy_content: Option<&'a str>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Default)]
pub struct ProductPatch<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub price_idr: Option<i64>,
    pub is_active: Option<bool>,
}

pub async fn create(pool: &SqlitePool, p: NewProduct<'_>, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO products (id, slug, title, description, price_idr, legacy_content,
                               is_active, is_sold, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, 1, 0, $7, $7)",
    )
    .bind(p.id)
    .bind(p.slug)
    .bind(p.title)
    .bind(p.description)
    .bind(p.price_idr)
    .bind(p.legacy_content)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update(
    pool: &SqlitePool,
    id: &str,
    patch: ProductPatch<'_>,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET
             title = COALESCE($1, title),
             description = COALESCE($2, description),
             price_idr = COALESCE($3, price_idr),
             is_active = COALESCE($4, is_active),
             updated_at = $5
         WHERE id = $6",
    )
    .bind(patch.title)
    .bind(patch.description)
    .bind(patch.price_idr)
    .bind(patch.is_active)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

/// Storefront listing: active products, newest first
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE is_active = 1 ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

/// Admin listing: everything, newest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

/// Unsold stock counts keyed by product id (products without
/// pool stock are absent from the map)
pub async fn unsold_counts(pool: &SqlitePool) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT product_id, COUNT(*) FROM stock_items WHERE is_sold = 0 GROUP BY product_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Recompute the sold flag of a pooled product from its stock. Legacy
/// products are skipped; their flag only moves via [`mark_sold_cas`].
pub async fn refresh_sold_flag(pool: &SqlitePool, id: &str, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET
             is_sold = CASE WHEN EXISTS (
                 SELECT 1 FROM stock_items WHERE product_id = $1 AND is_sold = 0
             ) THEN 0 ELSE 1 END,
             updated_at = $2
         WHERE id = $1 AND legacy_content IS NULL",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Claim a legacy single-unit product. Returns `true` for the one
/// caller that flipped the flag.
pub async fn mark_sold_cas(pool: &SqlitePool, id: &str, now: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET is_sold = 1, updated_at = $1 WHERE id = $2 AND is_sold = 0",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
