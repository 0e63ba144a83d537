//! Aggregate queries behind the reporting endpoints.
//!
//! Postgres does the grouping and summing; ratio math and rollups happen in
//! `diwali_core::analytics`.

use chrono::{DateTime, NaiveDate, Utc};
use diwali_core::analytics::{OrderSnapshot, OrderTotals, RevenueBucket, SessionTotals};
use diwali_core::DateRange;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// Headline counts for the outreach dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutreachSummary {
    pub total_links: i64,
    pub total_contacts: i64,
    pub total_events: i64,
    pub recent_links: i64,
    pub recent_events: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSnapshotRow {
    customer_phone: String,
    customer_name: String,
    customer_email: Option<String>,
    final_amount: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RevenueRow {
    date: NaiveDate,
    delivery_status: String,
    order_count: i64,
    total_amount: Decimal,
    delivery_cost: Decimal,
    final_amount: Decimal,
}

/// Aggregates over sessions whose `first_visit` falls in `range`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn session_totals_between(
    pool: &PgPool,
    range: &DateRange,
) -> Result<SessionTotals, DbError> {
    let (sessions, unique_sessions, returning, time_spent_seconds, page_views): (
        i64,
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        "SELECT COUNT(*), \
                COUNT(DISTINCT session_id), \
                COUNT(*) FILTER (WHERE visitor_type = 'customer'), \
                COALESCE(SUM(time_spent_seconds), 0)::BIGINT, \
                COALESCE(SUM(page_views), 0)::BIGINT \
         FROM visitor_sessions \
         WHERE first_visit BETWEEN $1 AND $2",
    )
    .bind(range.from)
    .bind(range.to)
    .fetch_one(pool)
    .await?;

    Ok(SessionTotals {
        sessions,
        unique_sessions,
        returning,
        time_spent_seconds,
        page_views,
    })
}

/// Order count and revenue (sum of `final_amount`) for orders created in
/// `range`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn order_totals_between(pool: &PgPool, range: &DateRange) -> Result<OrderTotals, DbError> {
    let (orders, revenue): (i64, Decimal) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(final_amount), 0) \
         FROM orders \
         WHERE created_at BETWEEN $1 AND $2",
    )
    .bind(range.from)
    .bind(range.to)
    .fetch_one(pool)
    .await?;

    Ok(OrderTotals { orders, revenue })
}

/// Cart-abandonment records with `abandoned_at` in `range`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_abandoned_between(pool: &PgPool, range: &DateRange) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM cart_abandonments WHERE abandoned_at BETWEEN $1 AND $2",
    )
    .bind(range.from)
    .bind(range.to)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// The customer-facing columns of every order, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_snapshots(pool: &PgPool) -> Result<Vec<OrderSnapshot>, DbError> {
    let rows = sqlx::query_as::<_, OrderSnapshotRow>(
        "SELECT customer_phone, customer_name, customer_email, final_amount, created_at \
         FROM orders \
         ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| OrderSnapshot {
            customer_phone: row.customer_phone,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            final_amount: row.final_amount,
            created_at: row.created_at,
        })
        .collect())
}

/// Non-cancelled orders in `range` grouped by UTC calendar day and delivery
/// status, ordered by day then status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn revenue_breakdown(
    pool: &PgPool,
    range: &DateRange,
) -> Result<Vec<RevenueBucket>, DbError> {
    let rows = sqlx::query_as::<_, RevenueRow>(
        "SELECT (created_at AT TIME ZONE 'UTC')::DATE AS date, \
                delivery_status, \
                COUNT(*) AS order_count, \
                SUM(total_amount) AS total_amount, \
                SUM(delivery_cost) AS delivery_cost, \
                SUM(final_amount) AS final_amount \
         FROM orders \
         WHERE status <> 'cancelled' AND created_at BETWEEN $1 AND $2 \
         GROUP BY 1, 2 \
         ORDER BY 1, 2",
    )
    .bind(range.from)
    .bind(range.to)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| RevenueBucket {
            date: row.date,
            delivery_status: row.delivery_status,
            order_count: row.order_count,
            total_amount: row.total_amount,
            delivery_cost: row.delivery_cost,
            final_amount: row.final_amount,
        })
        .collect())
}

/// Link, contact, and event totals plus links and events created since
/// `since`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn outreach_summary(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<OutreachSummary, DbError> {
    let (total_links, total_contacts, total_events, recent_links, recent_events): (
        i64,
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM personalized_links), \
                (SELECT COUNT(*) FROM contacts), \
                (SELECT COUNT(*) FROM link_tracking), \
                (SELECT COUNT(*) FROM personalized_links WHERE created_at >= $1), \
                (SELECT COUNT(*) FROM link_tracking WHERE timestamp >= $1)",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(OutreachSummary {
        total_links,
        total_contacts,
        total_events,
        recent_links,
        recent_events,
    })
}
