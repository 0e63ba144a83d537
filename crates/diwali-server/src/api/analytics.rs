//! Reporting endpoints: visitor funnel, customer lifetime value, cart
//! abandonment, and revenue. Also the admin actions on abandoned carts.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use diwali_core::analytics::{
    customer_analytics as rollup_customers, summarize_revenue, visitor_metrics, CustomerMetrics,
    RevenueBucket, RevenueSummary, VisitorMetrics,
};
use diwali_core::orders::OrderItem;
use diwali_core::DateRange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_core_error, map_db_error, map_db_error_for, parse_id, ApiError, AppState};

const REPORT_WINDOW_DAYS: i64 = 30;
const ABANDONMENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub(super) struct DateRangeQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl DateRangeQuery {
    fn resolve(&self, rid: &str) -> Result<DateRange, ApiError> {
        DateRange::resolve(
            self.date_from.as_deref(),
            self.date_to.as_deref(),
            Utc::now(),
            REPORT_WINDOW_DAYS,
        )
        .map_err(|e| map_core_error(rid, &e))
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CartAbandonmentItem {
    id: Uuid,
    session_id: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    items: Vec<OrderItem>,
    cart_total: Decimal,
    abandonment_stage: String,
    created_at: DateTime<Utc>,
    abandoned_at: DateTime<Utc>,
    recovery_attempts: i32,
    last_recovery_attempt_at: Option<DateTime<Utc>>,
    recovered: bool,
    recovery_order_id: Option<Uuid>,
}

impl From<diwali_db::CartAbandonmentRow> for CartAbandonmentItem {
    fn from(row: diwali_db::CartAbandonmentRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            items: row.items.0,
            cart_total: row.cart_total,
            abandonment_stage: row.abandonment_stage,
            created_at: row.created_at,
            abandoned_at: row.abandoned_at,
            recovery_attempts: row.recovery_attempts,
            last_recovery_attempt_at: row.last_recovery_attempt_at,
            recovered: row.recovered,
            recovery_order_id: row.recovery_order_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct RevenueReport {
    date_range: DateRange,
    revenue_breakdown: Vec<RevenueBucket>,
    summary: RevenueSummary,
}

#[derive(Debug, Deserialize)]
pub(super) struct MarkRecoveredRequest {
    pub order_id: String,
}

/// GET /api/admin/analytics/visitors
pub(super) async fn visitor_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<VisitorMetrics>, ApiError> {
    let rid = &req_id.0;
    let range = query.resolve(rid)?;

    let sessions = diwali_db::session_totals_between(&state.pool, &range)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let orders = diwali_db::order_totals_between(&state.pool, &range)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let abandoned = diwali_db::count_abandoned_between(&state.pool, &range)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(visitor_metrics(range, sessions, orders, abandoned)))
}

/// GET /api/admin/analytics/customers — biggest spenders first.
pub(super) async fn customer_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<CustomerMetrics>>, ApiError> {
    let snapshots = diwali_db::list_order_snapshots(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rollup_customers(&snapshots)))
}

/// GET /api/admin/analytics/cart-abandonment — unrecovered carts from the
/// last week, newest first.
pub(super) async fn cart_abandonment_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<CartAbandonmentItem>>, ApiError> {
    let since = Utc::now() - Duration::days(ABANDONMENT_WINDOW_DAYS);
    let rows = diwali_db::list_recent_unrecovered(&state.pool, since)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(CartAbandonmentItem::from).collect()))
}

/// GET /api/admin/analytics/revenue-report
pub(super) async fn revenue_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<RevenueReport>, ApiError> {
    let rid = &req_id.0;
    let range = query.resolve(rid)?;

    let buckets = diwali_db::revenue_breakdown(&state.pool, &range)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let summary = summarize_revenue(&buckets);

    Ok(Json(RevenueReport {
        date_range: range,
        revenue_breakdown: buckets,
        summary,
    }))
}

/// POST /api/admin/cart-abandonment/{id}/recovery-attempt
pub(super) async fn record_recovery_attempt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<CartAbandonmentItem>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "cart")?;
    let row = diwali_db::record_recovery_attempt(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "cart not found"))?;

    tracing::info!(cart_id = %row.id, attempts = row.recovery_attempts, "cart recovery attempted");
    Ok(Json(row.into()))
}

/// PUT /api/admin/cart-abandonment/{id}/recovered
pub(super) async fn mark_cart_recovered(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<MarkRecoveredRequest>,
) -> Result<Json<CartAbandonmentItem>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "cart")?;
    let order_id = parse_id(rid, &body.order_id, "order")?;
    diwali_db::get_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "order not found"))?;

    let row = diwali_db::mark_cart_recovered(&state.pool, id, order_id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "cart not found"))?;

    tracing::info!(cart_id = %row.id, order_id = %order_id, "cart recovered");
    Ok(Json(row.into()))
}
