//! Database operations for the `products` catalog.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub images: Vec<String>,
    pub description: String,
    pub note: Option<String>,
    pub base_price: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub offer_price: Option<Decimal>,
    pub unit: String,
    /// One of `active`, `inactive`, `out_of_stock`.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub category: &'a str,
    pub images: &'a [String],
    pub description: &'a str,
    pub note: Option<&'a str>,
    pub base_price: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub offer_price: Option<Decimal>,
    pub unit: &'a str,
    pub status: &'a str,
}

/// Sparse product update. `None` keeps the stored value; for nullable
/// columns `Some(None)` clears it.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ProductPatch<'a> {
    pub name: Option<&'a str>,
    pub category: Option<&'a str>,
    pub images: Option<&'a [String]>,
    pub description: Option<&'a str>,
    pub note: Option<Option<&'a str>>,
    pub base_price: Option<Decimal>,
    pub discount_percentage: Option<Option<Decimal>>,
    pub offer_price: Option<Option<Decimal>>,
    pub unit: Option<&'a str>,
    pub status: Option<&'a str>,
}

const PRODUCT_COLUMNS: &str = "id, name, category, images, description, note, base_price, \
     discount_percentage, offer_price, unit, status, created_at, updated_at";

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Inserts a product and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including check-constraint
/// violations on prices or status.
pub async fn create_product(pool: &PgPool, product: &NewProduct<'_>) -> Result<ProductRow, DbError> {
    let sql = format!(
        "INSERT INTO products \
             (id, name, category, images, description, note, base_price, \
              discount_percentage, offer_price, unit, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {PRODUCT_COLUMNS}"
    );

    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.category)
        .bind(product.images)
        .bind(product.description)
        .bind(product.note)
        .bind(product.base_price)
        .bind(product.discount_percentage)
        .bind(product.offer_price)
        .bind(product.unit)
        .bind(product.status)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Returns every product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(pool: &PgPool) -> Result<Vec<ProductRow>, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id");
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns products with status `active`, ordered by category then name for
/// storefront display.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_products(pool: &PgPool) -> Result<Vec<ProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE status = 'active' \
         ORDER BY category, name"
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<ProductRow, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Applies a sparse update and refreshes `updated_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn update_product(
    pool: &PgPool,
    id: Uuid,
    patch: &ProductPatch<'_>,
) -> Result<ProductRow, DbError> {
    let sql = format!(
        "UPDATE products \
         SET name                = COALESCE($2, name), \
             category            = COALESCE($3, category), \
             images              = COALESCE($4, images), \
             description         = COALESCE($5, description), \
             note                = CASE WHEN $6::BOOL THEN $7 ELSE note END, \
             base_price          = COALESCE($8, base_price), \
             discount_percentage = CASE WHEN $9::BOOL THEN $10 ELSE discount_percentage END, \
             offer_price         = CASE WHEN $11::BOOL THEN $12 ELSE offer_price END, \
             unit                = COALESCE($13, unit), \
             status              = COALESCE($14, status), \
             updated_at          = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    );

    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(patch.name)
        .bind(patch.category)
        .bind(patch.images)
        .bind(patch.description)
        .bind(patch.note.is_some())
        .bind(patch.note.flatten())
        .bind(patch.base_price)
        .bind(patch.discount_percentage.is_some())
        .bind(patch.discount_percentage.flatten())
        .bind(patch.offer_price.is_some())
        .bind(patch.offer_price.flatten())
        .bind(patch.unit)
        .bind(patch.status)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has `id`, or [`DbError::Sqlx`]
/// if the delete fails.
pub async fn delete_product(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
