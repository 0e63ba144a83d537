//! Database operations for `orders`.
//!
//! Line items live in a `JSONB` array and `final_amount` is a stored
//! generated column, so it can never drift from `total_amount + delivery_cost`.

use chrono::{DateTime, Utc};
use diwali_core::orders::OrderItem;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: String,
    pub delivery_date: DateTime<Utc>,
    pub items: Json<Vec<OrderItem>>,
    pub total_amount: Decimal,
    pub delivery_cost: Decimal,
    pub final_amount: Decimal,
    pub status: String,
    pub delivery_status: String,
    pub payment_status: String,
    pub referral_link_token: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub customer_name: &'a str,
    pub customer_phone: &'a str,
    pub customer_email: Option<&'a str>,
    pub customer_address: &'a str,
    pub delivery_date: DateTime<Utc>,
    pub items: &'a [OrderItem],
    pub total_amount: Decimal,
    pub delivery_cost: Decimal,
    pub status: &'a str,
    pub delivery_status: &'a str,
    pub payment_status: &'a str,
    pub referral_link_token: Option<&'a str>,
    pub notes: Option<&'a str>,
    /// Backdated creation time for seed data; `None` means now.
    pub created_at: Option<DateTime<Utc>>,
}

/// Filters for the admin order listing. Date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter<'a> {
    pub status: Option<&'a str>,
    pub delivery_status: Option<&'a str>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub limit: i64,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct OrderPatch<'a> {
    pub status: Option<&'a str>,
    pub delivery_status: Option<&'a str>,
    pub payment_status: Option<&'a str>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_cost: Option<Decimal>,
    pub notes: Option<Option<&'a str>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, customer_email, customer_address, \
     delivery_date, items, total_amount, delivery_cost, final_amount, status, delivery_status, \
     payment_status, referral_link_token, notes, created_at, updated_at, dispatched_at, delivered_at";

// ---------------------------------------------------------------------------
// orders operations
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including check-constraint
/// violations on amounts or statuses.
pub async fn insert_order<'e, E>(executor: E, order: &NewOrder<'_>) -> Result<OrderRow, DbError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO orders \
             (id, customer_name, customer_phone, customer_email, customer_address, \
              delivery_date, items, total_amount, delivery_cost, status, delivery_status, \
              payment_status, referral_link_token, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                 COALESCE($15, NOW()), COALESCE($15, NOW())) \
         RETURNING {ORDER_COLUMNS}"
    );

    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(order.customer_name)
        .bind(order.customer_phone)
        .bind(order.customer_email)
        .bind(order.customer_address)
        .bind(order.delivery_date)
        .bind(Json(order.items))
        .bind(order.total_amount)
        .bind(order.delivery_cost)
        .bind(order.status)
        .bind(order.delivery_status)
        .bind(order.payment_status)
        .bind(order.referral_link_token)
        .bind(order.notes)
        .bind(order.created_at)
        .fetch_one(executor)
        .await?;

    Ok(row)
}

/// Lists orders matching `filter`, newest first, capped at `filter.limit`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders(pool: &PgPool, filter: &OrderFilter<'_>) -> Result<Vec<OrderRow>, DbError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE ($1::TEXT IS NULL OR status = $1) \
           AND ($2::TEXT IS NULL OR delivery_status = $2) \
           AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3) \
           AND ($4::TIMESTAMPTZ IS NULL OR created_at <= $4) \
         ORDER BY created_at DESC, id \
         LIMIT $5"
    );

    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(filter.status)
        .bind(filter.delivery_status)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(filter.limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no order has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<OrderRow, DbError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Applies a sparse update and refreshes `updated_at`.
///
/// When the patch moves `delivery_status` to `dispatched` without an explicit
/// `dispatched_at` and the order has never been dispatched, `dispatched_at`
/// is stamped with the current time.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no order has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn update_order(
    pool: &PgPool,
    id: Uuid,
    patch: &OrderPatch<'_>,
) -> Result<OrderRow, DbError> {
    let sql = format!(
        "UPDATE orders \
         SET status          = COALESCE($2, status), \
             delivery_status = COALESCE($3, delivery_status), \
             payment_status  = COALESCE($4, payment_status), \
             delivery_date   = COALESCE($5, delivery_date), \
             delivery_cost   = COALESCE($6, delivery_cost), \
             notes           = CASE WHEN $7::BOOL THEN $8 ELSE notes END, \
             dispatched_at   = CASE \
                                 WHEN $9::TIMESTAMPTZ IS NOT NULL THEN $9 \
                                 WHEN $3 = 'dispatched' AND dispatched_at IS NULL THEN NOW() \
                                 ELSE dispatched_at \
                               END, \
             delivered_at    = COALESCE($10, delivered_at), \
             updated_at      = NOW() \
         WHERE id = $1 \
         RETURNING {ORDER_COLUMNS}"
    );

    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .bind(patch.status)
        .bind(patch.delivery_status)
        .bind(patch.payment_status)
        .bind(patch.delivery_date)
        .bind(patch.delivery_cost)
        .bind(patch.notes.is_some())
        .bind(patch.notes.flatten())
        .bind(patch.dispatched_at)
        .bind(patch.delivered_at)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Every order placed from `phone`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_by_phone(pool: &PgPool, phone: &str) -> Result<Vec<OrderRow>, DbError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE customer_phone = $1 \
         ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(phone)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
