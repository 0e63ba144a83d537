//! Database operations for `cart_abandonments`.

use chrono::{DateTime, Utc};
use diwali_core::orders::OrderItem;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `cart_abandonments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartAbandonmentRow {
    pub id: Uuid,
    pub session_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Json<Vec<OrderItem>>,
    pub cart_total: Decimal,
    pub abandonment_stage: String,
    pub created_at: DateTime<Utc>,
    pub abandoned_at: DateTime<Utc>,
    pub recovery_attempts: i32,
    pub last_recovery_attempt_at: Option<DateTime<Utc>>,
    pub recovered: bool,
    pub recovery_order_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewCartAbandonment<'a> {
    pub session_id: &'a str,
    pub customer_name: Option<&'a str>,
    pub customer_phone: Option<&'a str>,
    pub items: &'a [OrderItem],
    pub cart_total: Decimal,
    pub abandonment_stage: &'a str,
    /// When the cart was left; `None` means now.
    pub abandoned_at: Option<DateTime<Utc>>,
}

const CART_COLUMNS: &str = "id, session_id, customer_name, customer_phone, items, cart_total, \
     abandonment_stage, created_at, abandoned_at, recovery_attempts, last_recovery_attempt_at, \
     recovered, recovery_order_id";

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_cart_abandonment(
    pool: &PgPool,
    cart: &NewCartAbandonment<'_>,
) -> Result<CartAbandonmentRow, DbError> {
    let sql = format!(
        "INSERT INTO cart_abandonments \
             (id, session_id, customer_name, customer_phone, items, cart_total, \
              abandonment_stage, abandoned_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, NOW())) \
         RETURNING {CART_COLUMNS}"
    );

    let row = sqlx::query_as::<_, CartAbandonmentRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(cart.session_id)
        .bind(cart.customer_name)
        .bind(cart.customer_phone)
        .bind(Json(cart.items))
        .bind(cart.cart_total)
        .bind(cart.abandonment_stage)
        .bind(cart.abandoned_at)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no record has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_cart_abandonment(pool: &PgPool, id: Uuid) -> Result<CartAbandonmentRow, DbError> {
    let sql = format!("SELECT {CART_COLUMNS} FROM cart_abandonments WHERE id = $1");
    sqlx::query_as::<_, CartAbandonmentRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Unrecovered carts abandoned at or after `since`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_unrecovered(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<CartAbandonmentRow>, DbError> {
    let sql = format!(
        "SELECT {CART_COLUMNS} FROM cart_abandonments \
         WHERE recovered = false AND abandoned_at >= $1 \
         ORDER BY abandoned_at DESC, id"
    );
    let rows = sqlx::query_as::<_, CartAbandonmentRow>(&sql)
        .bind(since)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Increments `recovery_attempts` and stamps `last_recovery_attempt_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no record has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn record_recovery_attempt(
    pool: &PgPool,
    id: Uuid,
) -> Result<CartAbandonmentRow, DbError> {
    let sql = format!(
        "UPDATE cart_abandonments \
         SET recovery_attempts = recovery_attempts + 1, \
             last_recovery_attempt_at = NOW() \
         WHERE id = $1 \
         RETURNING {CART_COLUMNS}"
    );
    sqlx::query_as::<_, CartAbandonmentRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Marks the cart recovered by `order_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no record has `id`, or [`DbError::Sqlx`]
/// if the update fails (including an unknown order id).
pub async fn mark_cart_recovered(
    pool: &PgPool,
    id: Uuid,
    order_id: Uuid,
) -> Result<CartAbandonmentRow, DbError> {
    let sql = format!(
        "UPDATE cart_abandonments \
         SET recovered = true, recovery_order_id = $2 \
         WHERE id = $1 \
         RETURNING {CART_COLUMNS}"
    );
    sqlx::query_as::<_, CartAbandonmentRow>(&sql)
        .bind(id)
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}
