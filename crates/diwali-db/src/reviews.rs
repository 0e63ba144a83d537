//! Database operations for `review_requests` and `customer_reviews`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::orders::OrderRow;
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `review_requests` table. At most one per order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRequestRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub order_date: DateTime<Utc>,
    pub products_ordered: Vec<String>,
    pub request_sent_date: Option<DateTime<Utc>>,
    pub request_method: Option<String>,
    pub review_submitted: bool,
    pub review_submitted_date: Option<DateTime<Utc>>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct NewReviewRequest<'a> {
    pub order_id: Uuid,
    pub customer_name: &'a str,
    pub customer_phone: &'a str,
    pub order_date: DateTime<Utc>,
    pub products_ordered: &'a [String],
    pub request_method: &'a str,
}

/// A row from the `customer_reviews` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub product_id: String,
    pub product_name: String,
    pub overall_rating: i32,
    pub taste_rating: Option<i32>,
    pub packaging_rating: Option<i32>,
    pub delivery_rating: Option<i32>,
    pub comment: String,
    pub review_date: DateTime<Utc>,
    pub approved: bool,
    pub display_on_website: bool,
}

#[derive(Debug, Clone)]
pub struct NewReview<'a> {
    pub order_id: Uuid,
    pub customer_name: &'a str,
    pub customer_phone: &'a str,
    pub product_id: &'a str,
    pub product_name: &'a str,
    pub overall_rating: i32,
    pub taste_rating: Option<i32>,
    pub packaging_rating: Option<i32>,
    pub delivery_rating: Option<i32>,
    pub comment: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewRequestCounts {
    pub total: i64,
    pub submitted: i64,
    /// Distinct orders holding a request.
    pub orders: i64,
}

const REQUEST_COLUMNS: &str = "id, order_id, customer_name, customer_phone, order_date, \
     products_ordered, request_sent_date, request_method, review_submitted, \
     review_submitted_date, status";

const REVIEW_COLUMNS: &str = "id, order_id, customer_name, customer_phone, product_id, \
     product_name, overall_rating, taste_rating, packaging_rating, delivery_rating, comment, \
     review_date, approved, display_on_website";

// ---------------------------------------------------------------------------
// review_requests operations
// ---------------------------------------------------------------------------

/// Records a review request in `sent` state stamped with the current time.
///
/// Returns `None` when the order already has a request.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_review_request(
    pool: &PgPool,
    request: &NewReviewRequest<'_>,
) -> Result<Option<ReviewRequestRow>, DbError> {
    let sql = format!(
        "INSERT INTO review_requests \
             (id, order_id, customer_name, customer_phone, order_date, products_ordered, \
              request_sent_date, request_method, status) \
         VALUES ($1, $2, $3, $4, $5, $6, NOW(), $7, 'sent') \
         ON CONFLICT (order_id) DO NOTHING \
         RETURNING {REQUEST_COLUMNS}"
    );

    let row = sqlx::query_as::<_, ReviewRequestRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(request.order_id)
        .bind(request.customer_name)
        .bind(request.customer_phone)
        .bind(request.order_date)
        .bind(request.products_ordered)
        .bind(request.request_method)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no request has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_review_request(pool: &PgPool, id: Uuid) -> Result<ReviewRequestRow, DbError> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM review_requests WHERE id = $1");
    sqlx::query_as::<_, ReviewRequestRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Requests optionally filtered by status, most recently sent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_review_requests(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<ReviewRequestRow>, DbError> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM review_requests \
         WHERE ($1::TEXT IS NULL OR status = $1) \
         ORDER BY request_sent_date DESC NULLS LAST, id \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, ReviewRequestRow>(&sql)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Sets `status`. `submitted` drives `review_submitted`, and the submission
/// date is stamped when true and cleared when false.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no request has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn set_review_request_status(
    pool: &PgPool,
    id: Uuid,
    status: &str,
    submitted: bool,
) -> Result<ReviewRequestRow, DbError> {
    let sql = format!(
        "UPDATE review_requests \
         SET status = $2, \
             review_submitted = $3, \
             review_submitted_date = CASE WHEN $3 THEN NOW() ELSE NULL END \
         WHERE id = $1 \
         RETURNING {REQUEST_COLUMNS}"
    );
    sqlx::query_as::<_, ReviewRequestRow>(&sql)
        .bind(id)
        .bind(status)
        .bind(submitted)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Flags the order's request, if any, as reviewed.
///
/// Returns whether a request was updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_review_submitted_for_order(pool: &PgPool, order_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE review_requests \
         SET status = 'reviewed', review_submitted = true, review_submitted_date = NOW() \
         WHERE order_id = $1 AND review_submitted = false",
    )
    .bind(order_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn review_request_counts(pool: &PgPool) -> Result<ReviewRequestCounts, DbError> {
    let (total, submitted, orders): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
                COUNT(*) FILTER (WHERE review_submitted), \
                COUNT(DISTINCT order_id) \
         FROM review_requests",
    )
    .fetch_one(pool)
    .await?;

    Ok(ReviewRequestCounts {
        total,
        submitted,
        orders,
    })
}

/// Number of confirmed or delivered orders created at or after `since`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_review_window_orders(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM orders \
         WHERE created_at >= $1 AND status IN ('confirmed', 'delivered')",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Delivered orders created at or after `since` that have no review request
/// yet, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_eligible_orders(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT o.id, o.customer_name, o.customer_phone, o.customer_email, o.customer_address, \
                o.delivery_date, o.items, o.total_amount, o.delivery_cost, o.final_amount, \
                o.status, o.delivery_status, o.payment_status, o.referral_link_token, o.notes, \
                o.created_at, o.updated_at, o.dispatched_at, o.delivered_at \
         FROM orders o \
         WHERE o.created_at >= $1 \
           AND o.status = 'delivered' \
           AND NOT EXISTS (SELECT 1 FROM review_requests r WHERE r.order_id = o.id) \
         ORDER BY o.created_at DESC, o.id",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// customer_reviews operations
// ---------------------------------------------------------------------------

/// Stores a submitted review; it starts unapproved and hidden.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_review(pool: &PgPool, review: &NewReview<'_>) -> Result<ReviewRow, DbError> {
    let sql = format!(
        "INSERT INTO customer_reviews \
             (id, order_id, customer_name, customer_phone, product_id, product_name, \
              overall_rating, taste_rating, packaging_rating, delivery_rating, comment) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {REVIEW_COLUMNS}"
    );

    let row = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(review.order_id)
        .bind(review.customer_name)
        .bind(review.customer_phone)
        .bind(review.product_id)
        .bind(review.product_name)
        .bind(review.overall_rating)
        .bind(review.taste_rating)
        .bind(review.packaging_rating)
        .bind(review.delivery_rating)
        .bind(review.comment)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// All reviews, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reviews(pool: &PgPool) -> Result<Vec<ReviewRow>, DbError> {
    let sql = format!("SELECT {REVIEW_COLUMNS} FROM customer_reviews ORDER BY review_date DESC, id");
    let rows = sqlx::query_as::<_, ReviewRow>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// The `limit` most recent reviews.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_reviews(pool: &PgPool, limit: i64) -> Result<Vec<ReviewRow>, DbError> {
    let sql = format!(
        "SELECT {REVIEW_COLUMNS} FROM customer_reviews \
         ORDER BY review_date DESC, id \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Approved reviews flagged for the storefront, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_displayed_reviews(pool: &PgPool) -> Result<Vec<ReviewRow>, DbError> {
    let sql = format!(
        "SELECT {REVIEW_COLUMNS} FROM customer_reviews \
         WHERE approved AND display_on_website \
         ORDER BY review_date DESC, id"
    );
    let rows = sqlx::query_as::<_, ReviewRow>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Updates moderation flags; `None` keeps the stored value.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no review has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn moderate_review(
    pool: &PgPool,
    id: Uuid,
    approved: Option<bool>,
    display_on_website: Option<bool>,
) -> Result<ReviewRow, DbError> {
    let sql = format!(
        "UPDATE customer_reviews \
         SET approved = COALESCE($2, approved), \
             display_on_website = COALESCE($3, display_on_website) \
         WHERE id = $1 \
         RETURNING {REVIEW_COLUMNS}"
    );
    sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(id)
        .bind(approved)
        .bind(display_on_website)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_reviews(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customer_reviews")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
