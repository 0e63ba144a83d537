use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use diwali_core::orders::{
    validate_amount, validate_items, DeliveryStatus, OrderItem, OrderStatus, PaymentStatus,
};
use diwali_core::DateRange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    double_option, map_core_error, map_db_error, map_db_error_for, normalize_limit, parse_enum,
    parse_id, require_text, ApiError, AppState,
};

const DEFAULT_ORDER_LIMIT: i64 = 100;
const MAX_ORDER_LIMIT: i64 = 1000;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct OrderResponse {
    id: Uuid,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    customer_address: String,
    delivery_date: DateTime<Utc>,
    items: Vec<OrderItem>,
    total_amount: Decimal,
    delivery_cost: Decimal,
    final_amount: Decimal,
    status: String,
    delivery_status: String,
    payment_status: String,
    referral_link_token: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    dispatched_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl From<diwali_db::OrderRow> for OrderResponse {
    fn from(row: diwali_db::OrderRow) -> Self {
        Self {
            id: row.id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            customer_address: row.customer_address,
            delivery_date: row.delivery_date,
            items: row.items.0,
            total_amount: row.total_amount,
            delivery_cost: row.delivery_cost,
            final_amount: row.final_amount,
            status: row.status,
            delivery_status: row.delivery_status,
            payment_status: row.payment_status,
            referral_link_token: row.referral_link_token,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            dispatched_at: row.dispatched_at,
            delivered_at: row.delivered_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: String,
    pub delivery_date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub delivery_cost: Decimal,
    pub referral_link_token: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderListQuery {
    pub status: Option<String>,
    pub delivery_status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<i64>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateOrderRequest {
    pub status: Option<String>,
    pub delivery_status: Option<String>,
    pub payment_status: Option<String>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_cost: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/orders — storefront checkout.
pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let rid = &req_id.0;

    let customer_name = require_text(rid, "customer_name", &body.customer_name)?;
    let customer_phone = require_text(rid, "customer_phone", &body.customer_phone)?;
    let customer_address = require_text(rid, "customer_address", &body.customer_address)?;
    validate_items(&body.items).map_err(|e| map_core_error(rid, &e))?;
    validate_amount("total_amount", body.total_amount).map_err(|e| map_core_error(rid, &e))?;
    validate_amount("delivery_cost", body.delivery_cost).map_err(|e| map_core_error(rid, &e))?;

    let row = diwali_db::insert_order(
        &state.pool,
        &diwali_db::NewOrder {
            customer_name,
            customer_phone,
            customer_email: body.customer_email.as_deref(),
            customer_address,
            delivery_date: body.delivery_date,
            items: &body.items,
            total_amount: body.total_amount,
            delivery_cost: body.delivery_cost,
            status: OrderStatus::Pending.as_str(),
            delivery_status: DeliveryStatus::Pending.as_str(),
            payment_status: PaymentStatus::Pending.as_str(),
            referral_link_token: body
                .referral_link_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty()),
            notes: body.notes.as_deref(),
            created_at: None,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(order_id = %row.id, final_amount = %row.final_amount, "order placed");
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /api/admin/orders — filtered, newest first.
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let rid = &req_id.0;

    let status = query
        .status
        .as_deref()
        .map(|raw| parse_enum::<OrderStatus>(rid, raw))
        .transpose()?;
    let delivery_status = query
        .delivery_status
        .as_deref()
        .map(|raw| parse_enum::<DeliveryStatus>(rid, raw))
        .transpose()?;
    let (created_from, created_to) =
        DateRange::parse_optional(query.date_from.as_deref(), query.date_to.as_deref())
            .map_err(|e| map_core_error(rid, &e))?;

    let rows = diwali_db::list_orders(
        &state.pool,
        &diwali_db::OrderFilter {
            status: status.map(OrderStatus::as_str),
            delivery_status: delivery_status.map(DeliveryStatus::as_str),
            created_from,
            created_to,
            limit: normalize_limit(query.limit, DEFAULT_ORDER_LIMIT, MAX_ORDER_LIMIT),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(rows.into_iter().map(OrderResponse::from).collect()))
}

/// GET /api/admin/orders/{id}
pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "order")?;
    let row = diwali_db::get_order(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "order not found"))?;
    Ok(Json(row.into()))
}

/// PUT /api/admin/orders/{id} — partial update; dispatch time is stamped on
/// the first move to `dispatched`.
pub(super) async fn update_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "order")?;

    let status = body
        .status
        .as_deref()
        .map(|raw| parse_enum::<OrderStatus>(rid, raw))
        .transpose()?;
    let delivery_status = body
        .delivery_status
        .as_deref()
        .map(|raw| parse_enum::<DeliveryStatus>(rid, raw))
        .transpose()?;
    let payment_status = body
        .payment_status
        .as_deref()
        .map(|raw| parse_enum::<PaymentStatus>(rid, raw))
        .transpose()?;
    if let Some(cost) = body.delivery_cost {
        validate_amount("delivery_cost", cost).map_err(|e| map_core_error(rid, &e))?;
    }

    let row = diwali_db::update_order(
        &state.pool,
        id,
        &diwali_db::OrderPatch {
            status: status.map(OrderStatus::as_str),
            delivery_status: delivery_status.map(DeliveryStatus::as_str),
            payment_status: payment_status.map(PaymentStatus::as_str),
            delivery_date: body.delivery_date,
            delivery_cost: body.delivery_cost,
            notes: body.notes.as_ref().map(Option::as_deref),
            dispatched_at: body.dispatched_at,
            delivered_at: body.delivered_at,
        },
    )
    .await
    .map_err(|e| map_db_error_for(rid, &e, "order not found"))?;

    tracing::info!(
        order_id = %row.id,
        status = %row.status,
        delivery_status = %row.delivery_status,
        "order updated"
    );
    Ok(Json(row.into()))
}

/// GET /api/admin/orders/customer/{phone} — full history, newest first.
pub(super) async fn list_customer_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(phone): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let rows = diwali_db::list_orders_by_phone(&state.pool, &phone)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(OrderResponse::from).collect()))
}
