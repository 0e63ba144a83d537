use diwali_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

pub mod analytics;
pub mod cart_abandonment;
pub mod contacts;
pub mod links;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod seed;
pub mod visitors;

pub use analytics::{
    count_abandoned_between, list_order_snapshots, order_totals_between, outreach_summary,
    revenue_breakdown, session_totals_between, OutreachSummary,
};
pub use cart_abandonment::{
    get_cart_abandonment, insert_cart_abandonment, list_recent_unrecovered,
    mark_cart_recovered, record_recovery_attempt, CartAbandonmentRow, NewCartAbandonment,
};
pub use contacts::{
    bulk_insert_contacts, create_contact, delete_contact, get_contact, list_contacts,
    touch_last_contacted, update_contact, ContactPatch, ContactRow, NewContact,
};
pub use links::{
    create_link, create_message_template, deactivate_link, find_link_by_token,
    insert_link_event, list_link_events, list_links_with_contacts, list_message_templates,
    LinkEventRow, LinkOverviewRow, LinkRow, MessageTemplateRow, NewLinkEvent,
};
pub use orders::{
    get_order, insert_order, list_orders, list_orders_by_phone, update_order, NewOrder,
    OrderFilter, OrderPatch, OrderRow,
};
pub use products::{
    create_product, delete_product, get_product, list_active_products, list_products,
    update_product, NewProduct, ProductPatch, ProductRow,
};
pub use reviews::{
    count_review_window_orders, count_reviews, create_review_request, get_review_request,
    insert_review, list_displayed_reviews, list_eligible_orders, list_recent_reviews,
    list_review_requests, list_reviews, mark_review_submitted_for_order, moderate_review,
    review_request_counts, set_review_request_status, NewReview, NewReviewRequest,
    ReviewRequestCounts, ReviewRequestRow, ReviewRow,
};
pub use seed::seed_sample_data;
pub use visitors::{
    apply_session_event, ensure_session, get_session, insert_visitor_event,
    list_session_events, upsert_session, SessionUpsert, VisitorEventRow, VisitorSessionRow,
    NewVisitorEvent,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/diwali-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// True when the error is a Postgres unique-constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlx(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23505")
        )
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}
