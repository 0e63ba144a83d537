//! Database operations for `personalized_links`, `link_tracking`, and
//! `message_templates`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `personalized_links` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkRow {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub link_token: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// `NULL` for links that never expire.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// A link joined with its contact and the revenue it brought in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkOverviewRow {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub link_token: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub contact_name: String,
    pub contact_phone: String,
    /// Sum of `final_amount` over orders carrying this link's token; `NULL`
    /// when there are none.
    pub total_order_value: Option<Decimal>,
}

/// A row from the append-only `link_tracking` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkEventRow {
    pub id: Uuid,
    pub link_id: Uuid,
    pub contact_id: Uuid,
    pub event_type: String,
    pub page_url: Option<String>,
    pub product_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLinkEvent<'a> {
    pub link_id: Uuid,
    pub contact_id: Uuid,
    pub event_type: &'a str,
    pub page_url: Option<&'a str>,
    pub product_id: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub ip_address: Option<&'a str>,
}

/// A row from the `message_templates` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageTemplateRow {
    pub id: Uuid,
    pub name: String,
    pub message: String,
    pub variables: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// personalized_links operations
// ---------------------------------------------------------------------------

/// Inserts an active link for `contact_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a token
/// collision or an unknown contact).
pub async fn create_link(
    pool: &PgPool,
    contact_id: Uuid,
    link_token: &str,
    message: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<LinkRow, DbError> {
    let row = sqlx::query_as::<_, LinkRow>(
        "INSERT INTO personalized_links (id, contact_id, link_token, message, expires_at, is_active) \
         VALUES ($1, $2, $3, $4, $5, true) \
         RETURNING id, contact_id, link_token, message, created_at, expires_at, is_active",
    )
    .bind(Uuid::new_v4())
    .bind(contact_id)
    .bind(link_token)
    .bind(message)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Looks a link up by token regardless of its state. Callers decide whether
/// an inactive or expired link is acceptable.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the token is unknown, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn find_link_by_token(pool: &PgPool, link_token: &str) -> Result<LinkRow, DbError> {
    sqlx::query_as::<_, LinkRow>(
        "SELECT id, contact_id, link_token, message, created_at, expires_at, is_active \
         FROM personalized_links \
         WHERE link_token = $1",
    )
    .bind(link_token)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Sets `is_active = false`. Deactivating an inactive link is a no-op that
/// still returns the row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no link has `id`, or [`DbError::Sqlx`] if
/// the update fails.
pub async fn deactivate_link(pool: &PgPool, id: Uuid) -> Result<LinkRow, DbError> {
    sqlx::query_as::<_, LinkRow>(
        "UPDATE personalized_links \
         SET is_active = false \
         WHERE id = $1 \
         RETURNING id, contact_id, link_token, message, created_at, expires_at, is_active",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns every link with contact details and attributed order value,
/// newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_links_with_contacts(pool: &PgPool) -> Result<Vec<LinkOverviewRow>, DbError> {
    let rows = sqlx::query_as::<_, LinkOverviewRow>(
        "SELECT l.id, l.contact_id, l.link_token, l.message, l.created_at, l.expires_at, \
                l.is_active, c.name AS contact_name, c.phone AS contact_phone, \
                (SELECT SUM(o.final_amount) FROM orders o \
                  WHERE o.referral_link_token = l.link_token) AS total_order_value \
         FROM personalized_links l \
         JOIN contacts c ON c.id = l.contact_id \
         ORDER BY l.created_at DESC, l.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// link_tracking operations
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_link_event(
    pool: &PgPool,
    event: &NewLinkEvent<'_>,
) -> Result<LinkEventRow, DbError> {
    let row = sqlx::query_as::<_, LinkEventRow>(
        "INSERT INTO link_tracking \
             (id, link_id, contact_id, event_type, page_url, product_id, user_agent, ip_address) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id, link_id, contact_id, event_type, page_url, product_id, \
                   user_agent, ip_address, timestamp",
    )
    .bind(Uuid::new_v4())
    .bind(event.link_id)
    .bind(event.contact_id)
    .bind(event.event_type)
    .bind(event.page_url)
    .bind(event.product_id)
    .bind(event.user_agent)
    .bind(event.ip_address)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns tracking events, optionally restricted to one link, ordered by
/// link then time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_link_events(
    pool: &PgPool,
    link_id: Option<Uuid>,
) -> Result<Vec<LinkEventRow>, DbError> {
    let rows = sqlx::query_as::<_, LinkEventRow>(
        "SELECT id, link_id, contact_id, event_type, page_url, product_id, \
                user_agent, ip_address, timestamp \
         FROM link_tracking \
         WHERE ($1::UUID IS NULL OR link_id = $1) \
         ORDER BY link_id, timestamp",
    )
    .bind(link_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// message_templates operations
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_message_template(
    pool: &PgPool,
    name: &str,
    message: &str,
    variables: &[String],
) -> Result<MessageTemplateRow, DbError> {
    let row = sqlx::query_as::<_, MessageTemplateRow>(
        "INSERT INTO message_templates (id, name, message, variables) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, name, message, variables, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(message)
    .bind(variables)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns all templates, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_message_templates(pool: &PgPool) -> Result<Vec<MessageTemplateRow>, DbError> {
    let rows = sqlx::query_as::<_, MessageTemplateRow>(
        "SELECT id, name, message, variables, created_at \
         FROM message_templates \
         ORDER BY created_at DESC, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
