//! Public ingestion for storefront visitor sessions, visitor events, and
//! abandoned carts.

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use diwali_core::orders::{validate_amount, validate_items, OrderItem};
use diwali_core::visitors::{counter_for_event, AbandonmentStage, VisitorType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_core_error, map_db_error, parse_enum, require_text, ApiError, AppState, StatusResponse};

#[derive(Debug, Deserialize)]
pub(super) struct VisitorSessionRequest {
    pub session_id: String,
    pub visitor_type: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub referral_link_token: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VisitorEventRequest {
    pub session_id: String,
    pub event_type: String,
    pub page_url: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub cart_value: Option<Decimal>,
    pub order_id: Option<String>,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CartAbandonmentRequest {
    pub session_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<OrderItem>,
    pub cart_total: Decimal,
    pub abandonment_stage: Option<String>,
    pub abandoned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct CartAbandonmentResponse {
    status: &'static str,
    id: Uuid,
}

/// POST /api/track/visitor-session — create or refresh a session.
pub(super) async fn track_visitor_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<VisitorSessionRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let rid = &req_id.0;
    let session_id = require_text(rid, "session_id", &body.session_id)?;
    let visitor_type = body
        .visitor_type
        .as_deref()
        .map(|raw| parse_enum::<VisitorType>(rid, raw))
        .transpose()?;

    diwali_db::upsert_session(
        &state.pool,
        &diwali_db::SessionUpsert {
            session_id,
            visitor_type: visitor_type.map(VisitorType::as_str),
            customer_phone: body.customer_phone.as_deref(),
            customer_name: body.customer_name.as_deref(),
            referral_link_token: body.referral_link_token.as_deref(),
            ip_address: body.ip_address.as_deref(),
            user_agent: body.user_agent.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(StatusResponse { status: "tracked" }))
}

/// POST /api/track/visitor-event — append the event and bump the session
/// counter it maps to.
pub(super) async fn track_visitor_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<VisitorEventRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let rid = &req_id.0;
    let session_id = require_text(rid, "session_id", &body.session_id)?;
    let event_type = require_text(rid, "event_type", &body.event_type)?;
    if body.duration_seconds.is_some_and(|d| d < 0) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "duration_seconds must not be negative",
        ));
    }
    if let Some(value) = body.cart_value {
        validate_amount("cart_value", value).map_err(|e| map_core_error(rid, &e))?;
    }

    diwali_db::ensure_session(&state.pool, session_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    diwali_db::insert_visitor_event(
        &state.pool,
        &diwali_db::NewVisitorEvent {
            session_id,
            event_type,
            page_url: body.page_url.as_deref(),
            product_id: body.product_id.as_deref(),
            product_name: body.product_name.as_deref(),
            cart_value: body.cart_value,
            order_id: body.order_id.as_deref(),
            duration_seconds: body.duration_seconds,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    diwali_db::apply_session_event(
        &state.pool,
        session_id,
        counter_for_event(event_type),
        body.cart_value,
        body.duration_seconds,
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::debug!(session_id, event_type, "visitor event tracked");
    Ok(Json(StatusResponse { status: "tracked" }))
}

/// POST /api/track/cart-abandonment — snapshot of a cart left behind.
pub(super) async fn track_cart_abandonment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CartAbandonmentRequest>,
) -> Result<(StatusCode, Json<CartAbandonmentResponse>), ApiError> {
    let rid = &req_id.0;
    let session_id = require_text(rid, "session_id", &body.session_id)?;
    validate_items(&body.items).map_err(|e| map_core_error(rid, &e))?;
    validate_amount("cart_total", body.cart_total).map_err(|e| map_core_error(rid, &e))?;
    let stage = match body.abandonment_stage.as_deref() {
        Some(raw) => parse_enum::<AbandonmentStage>(rid, raw)?,
        None => AbandonmentStage::Cart,
    };

    let row = diwali_db::insert_cart_abandonment(
        &state.pool,
        &diwali_db::NewCartAbandonment {
            session_id,
            customer_name: body.customer_name.as_deref(),
            customer_phone: body.customer_phone.as_deref(),
            items: &body.items,
            cart_total: body.cart_total,
            abandonment_stage: stage.as_str(),
            abandoned_at: body.abandoned_at,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(cart_id = %row.id, stage = %stage, "cart abandonment recorded");
    Ok((
        StatusCode::CREATED,
        Json(CartAbandonmentResponse {
            status: "tracked",
            id: row.id,
        }),
    ))
}
