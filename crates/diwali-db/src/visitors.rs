//! Database operations for `visitor_sessions` and `visitor_events`.

use chrono::{DateTime, Utc};
use diwali_core::visitors::SessionCounter;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `visitor_sessions` table, keyed by the client's session id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VisitorSessionRow {
    pub session_id: String,
    pub visitor_type: String,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub referral_link_token: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub first_visit: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub page_views: i32,
    pub time_spent_seconds: i64,
    pub cart_additions: i32,
    pub checkout_attempts: i32,
    pub orders_placed: i32,
    pub total_order_value: Decimal,
    pub converted: bool,
}

/// A row from the append-only `visitor_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VisitorEventRow {
    pub id: Uuid,
    pub session_id: String,
    pub event_type: String,
    pub page_url: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub cart_value: Option<Decimal>,
    pub order_id: Option<String>,
    pub duration_seconds: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Session identity as reported by the storefront. `None` fields leave the
/// stored value untouched on an existing session.
#[derive(Debug, Clone, Default)]
pub struct SessionUpsert<'a> {
    pub session_id: &'a str,
    pub visitor_type: Option<&'a str>,
    pub customer_phone: Option<&'a str>,
    pub customer_name: Option<&'a str>,
    pub referral_link_token: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewVisitorEvent<'a> {
    pub session_id: &'a str,
    pub event_type: &'a str,
    pub page_url: Option<&'a str>,
    pub product_id: Option<&'a str>,
    pub product_name: Option<&'a str>,
    pub cart_value: Option<Decimal>,
    pub order_id: Option<&'a str>,
    pub duration_seconds: Option<i64>,
}

const SESSION_COLUMNS: &str = "session_id, visitor_type, customer_phone, customer_name, \
     referral_link_token, ip_address, user_agent, first_visit, last_activity, page_views, \
     time_spent_seconds, cart_additions, checkout_attempts, orders_placed, total_order_value, \
     converted";

// ---------------------------------------------------------------------------
// visitor_sessions operations
// ---------------------------------------------------------------------------

/// Creates the session on first sight; otherwise refreshes `last_activity`
/// and overwrites whichever identity fields were supplied.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_session(
    pool: &PgPool,
    session: &SessionUpsert<'_>,
) -> Result<VisitorSessionRow, DbError> {
    let sql = format!(
        "INSERT INTO visitor_sessions \
             (session_id, visitor_type, customer_phone, customer_name, referral_link_token, \
              ip_address, user_agent) \
         VALUES ($1, COALESCE($2, 'anonymous'), $3, $4, $5, $6, $7) \
         ON CONFLICT (session_id) DO UPDATE SET \
             visitor_type        = COALESCE($2, visitor_sessions.visitor_type), \
             customer_phone      = COALESCE(EXCLUDED.customer_phone, visitor_sessions.customer_phone), \
             customer_name       = COALESCE(EXCLUDED.customer_name, visitor_sessions.customer_name), \
             referral_link_token = COALESCE(EXCLUDED.referral_link_token, visitor_sessions.referral_link_token), \
             ip_address          = COALESCE(EXCLUDED.ip_address, visitor_sessions.ip_address), \
             user_agent          = COALESCE(EXCLUDED.user_agent, visitor_sessions.user_agent), \
             last_activity       = NOW() \
         RETURNING {SESSION_COLUMNS}"
    );

    let row = sqlx::query_as::<_, VisitorSessionRow>(&sql)
        .bind(session.session_id)
        .bind(session.visitor_type)
        .bind(session.customer_phone)
        .bind(session.customer_name)
        .bind(session.referral_link_token)
        .bind(session.ip_address)
        .bind(session.user_agent)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Creates an anonymous session if `session_id` has never been seen.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn ensure_session(pool: &PgPool, session_id: &str) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO visitor_sessions (session_id) VALUES ($1) \
         ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the session is unknown, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_session(pool: &PgPool, session_id: &str) -> Result<VisitorSessionRow, DbError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM visitor_sessions WHERE session_id = $1");
    sqlx::query_as::<_, VisitorSessionRow>(&sql)
        .bind(session_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Bumps the session counters for one event in a single statement.
///
/// `counter` selects which funnel counter to increment; `OrdersPlaced` also
/// adds `cart_value` to the session's order value and marks it converted.
/// `duration_seconds` is added to time spent regardless of the counter.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the session is unknown, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn apply_session_event(
    pool: &PgPool,
    session_id: &str,
    counter: Option<SessionCounter>,
    cart_value: Option<Decimal>,
    duration_seconds: Option<i64>,
) -> Result<VisitorSessionRow, DbError> {
    let bump = |target: SessionCounter| i32::from(counter == Some(target));
    let order_placed = counter == Some(SessionCounter::OrdersPlaced);
    let order_value = if order_placed {
        cart_value.unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    let sql = format!(
        "UPDATE visitor_sessions \
         SET page_views         = page_views + $2, \
             cart_additions     = cart_additions + $3, \
             checkout_attempts  = checkout_attempts + $4, \
             orders_placed      = orders_placed + $5, \
             total_order_value  = total_order_value + $6, \
             converted          = converted OR $7, \
             time_spent_seconds = time_spent_seconds + $8, \
             last_activity      = NOW() \
         WHERE session_id = $1 \
         RETURNING {SESSION_COLUMNS}"
    );

    sqlx::query_as::<_, VisitorSessionRow>(&sql)
        .bind(session_id)
        .bind(bump(SessionCounter::PageViews))
        .bind(bump(SessionCounter::CartAdditions))
        .bind(bump(SessionCounter::CheckoutAttempts))
        .bind(bump(SessionCounter::OrdersPlaced))
        .bind(order_value)
        .bind(order_placed)
        .bind(duration_seconds.unwrap_or(0))
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// visitor_events operations
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including an unknown
/// session id.
pub async fn insert_visitor_event(
    pool: &PgPool,
    event: &NewVisitorEvent<'_>,
) -> Result<VisitorEventRow, DbError> {
    let row = sqlx::query_as::<_, VisitorEventRow>(
        "INSERT INTO visitor_events \
             (id, session_id, event_type, page_url, product_id, product_name, cart_value, \
              order_id, duration_seconds) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id, session_id, event_type, page_url, product_id, product_name, \
                   cart_value, order_id, duration_seconds, timestamp",
    )
    .bind(Uuid::new_v4())
    .bind(event.session_id)
    .bind(event.event_type)
    .bind(event.page_url)
    .bind(event.product_id)
    .bind(event.product_name)
    .bind(event.cart_value)
    .bind(event.order_id)
    .bind(event.duration_seconds)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Events recorded for one session, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_session_events(
    pool: &PgPool,
    session_id: &str,
) -> Result<Vec<VisitorEventRow>, DbError> {
    let rows = sqlx::query_as::<_, VisitorEventRow>(
        "SELECT id, session_id, event_type, page_url, product_id, product_name, \
                cart_value, order_id, duration_seconds, timestamp \
         FROM visitor_events \
         WHERE session_id = $1 \
         ORDER BY timestamp, id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
