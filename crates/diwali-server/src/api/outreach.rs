//! Personalized referral links, outreach messages, link tracking, and the
//! outreach dashboards.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use diwali_core::outreach::{
    generate_link_token, link_expiry, link_status, personalized_url, render_message,
    summarize_link_events, template_variables, LinkEngagement, LinkEventRecord, LinkEventType,
    LinkStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_db_error_for, parse_enum, parse_id, require_text, ApiError, AppState,
    StatusResponse,
};

const SUMMARY_WINDOW_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct CreateLinkRequest {
    pub contact_id: String,
    pub message: String,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateLinkResponse {
    link_id: Uuid,
    link_token: String,
    personalized_url: String,
    message: String,
    contact_name: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct LinkItem {
    id: Uuid,
    contact_id: Uuid,
    contact_name: String,
    contact_phone: String,
    link_token: String,
    personalized_url: String,
    message: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    link_status: LinkStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct DeactivatedLink {
    id: Uuid,
    link_token: String,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct SendMessageRequest {
    pub contact_id: String,
    pub message_template: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SendMessageResponse {
    contact_name: String,
    contact_phone: String,
    message: String,
    link_id: Uuid,
    personalized_url: String,
    status: &'static str,
}

#[derive(Debug, Deserialize)]
pub(super) struct TrackLinkEventRequest {
    pub link_token: String,
    pub event_type: String,
    pub page_url: Option<String>,
    pub product_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct LinkAnalyticsItem {
    link_id: Uuid,
    contact_name: String,
    contact_phone: String,
    #[serde(flatten)]
    engagement: LinkEngagement,
    total_order_value: Option<Decimal>,
    created_at: DateTime<Utc>,
    link_status: LinkStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct OutreachSummaryResponse {
    total_personalized_links: i64,
    total_contacts: i64,
    total_tracking_events: i64,
    recent_links_30_days: i64,
    recent_events_30_days: i64,
    last_updated: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateTemplateRequest {
    pub name: String,
    pub message: String,
    pub variables: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(super) struct TemplateItem {
    id: Uuid,
    name: String,
    message: String,
    variables: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<diwali_db::MessageTemplateRow> for TemplateItem {
    fn from(row: diwali_db::MessageTemplateRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            message: row.message,
            variables: row.variables,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Issue a fresh link for `contact`, expiring after `expires_in_days`
/// (zero means never).
async fn issue_link(
    state: &AppState,
    rid: &str,
    contact: &diwali_db::ContactRow,
    message: &str,
    expires_in_days: i64,
) -> Result<(diwali_db::LinkRow, String), ApiError> {
    let token = generate_link_token();
    let expires_at = link_expiry(Utc::now(), expires_in_days);
    let link = diwali_db::create_link(&state.pool, contact.id, &token, message, expires_at)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?;
    let url = personalized_url(&state.config.app_domain, &link.link_token);

    tracing::info!(link_id = %link.id, contact_id = %contact.id, "personalized link issued");
    Ok((link, url))
}

async fn load_contact(
    state: &AppState,
    rid: &str,
    raw_id: &str,
) -> Result<diwali_db::ContactRow, ApiError> {
    let id = parse_id(rid, raw_id, "contact")?;
    diwali_db::get_contact(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "contact not found"))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// First hop of `X-Forwarded-For`, i.e. the original client.
fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for").and_then(|v| {
        v.split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(ToOwned::to_owned)
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/admin/personalized-links
pub(super) async fn create_personalized_link(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<CreateLinkResponse>), ApiError> {
    let rid = &req_id.0;
    let message = require_text(rid, "message", &body.message)?;
    let expires_in_days = body
        .expires_in_days
        .unwrap_or(state.config.link_expiry_days);
    if expires_in_days < 0 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "expires_in_days must not be negative",
        ));
    }

    let contact = load_contact(&state, rid, &body.contact_id).await?;
    let (link, url) = issue_link(&state, rid, &contact, message, expires_in_days).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateLinkResponse {
            link_id: link.id,
            link_token: link.link_token,
            personalized_url: url,
            message: link.message,
            contact_name: contact.name,
            expires_at: link.expires_at,
        }),
    ))
}

/// GET /api/admin/personalized-links — newest first.
pub(super) async fn list_links(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<LinkItem>>, ApiError> {
    let rows = diwali_db::list_links_with_contacts(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let now = Utc::now();
    let items = rows
        .into_iter()
        .map(|row| LinkItem {
            personalized_url: personalized_url(&state.config.app_domain, &row.link_token),
            link_status: link_status(row.is_active, row.expires_at, now),
            id: row.id,
            contact_id: row.contact_id,
            contact_name: row.contact_name,
            contact_phone: row.contact_phone,
            link_token: row.link_token,
            message: row.message,
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        })
        .collect();
    Ok(Json(items))
}

/// PUT /api/admin/personalized-links/{id}/deactivate
pub(super) async fn deactivate_link(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<DeactivatedLink>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "link")?;
    let link = diwali_db::deactivate_link(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "link not found"))?;

    tracing::info!(link_id = %link.id, "personalized link deactivated");
    Ok(Json(DeactivatedLink {
        id: link.id,
        link_token: link.link_token,
        is_active: link.is_active,
    }))
}

/// POST /api/admin/send-personalized-message — formats the message; delivery
/// is left to the operator.
pub(super) async fn send_personalized_message(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let rid = &req_id.0;
    let template = require_text(rid, "message_template", &body.message_template)?;

    let contact = load_contact(&state, rid, &body.contact_id).await?;
    let (link, url) = issue_link(
        &state,
        rid,
        &contact,
        template,
        state.config.link_expiry_days,
    )
    .await?;
    let message = render_message(template, &contact.name, &url);

    diwali_db::touch_last_contacted(&state.pool, contact.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(SendMessageResponse {
        contact_name: contact.name,
        contact_phone: contact.phone,
        message,
        link_id: link.id,
        personalized_url: url,
        status: "ready_to_send",
    }))
}

/// POST /api/track/link-event — public funnel tracking for referral links.
pub(super) async fn track_link_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<TrackLinkEventRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let rid = &req_id.0;
    let event_type = parse_enum::<LinkEventType>(rid, &body.event_type)?;

    let link = diwali_db::find_link_by_token(&state.pool, body.link_token.trim())
        .await
        .map_err(|e| map_db_error_for(rid, &e, "invalid or expired link"))?;
    if link_status(link.is_active, link.expires_at, Utc::now()) != LinkStatus::Active {
        return Err(ApiError::new(rid, "not_found", "invalid or expired link"));
    }

    let user_agent = body
        .user_agent
        .or_else(|| header_value(&headers, "user-agent"));
    let ip_address = body.ip_address.or_else(|| forwarded_client_ip(&headers));

    diwali_db::insert_link_event(
        &state.pool,
        &diwali_db::NewLinkEvent {
            link_id: link.id,
            contact_id: link.contact_id,
            event_type: event_type.as_str(),
            page_url: body.page_url.as_deref(),
            product_id: body.product_id.as_deref(),
            user_agent: user_agent.as_deref(),
            ip_address: ip_address.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::debug!(link_id = %link.id, event_type = %event_type, "link event tracked");
    Ok(Json(StatusResponse { status: "tracked" }))
}

/// GET /api/admin/analytics/links — funnel rollup per link.
pub(super) async fn link_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<LinkAnalyticsItem>>, ApiError> {
    let rid = &req_id.0;
    let links = diwali_db::list_links_with_contacts(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let events = diwali_db::list_link_events(&state.pool, None)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let mut by_link: HashMap<Uuid, Vec<LinkEventRecord>> = HashMap::new();
    for event in events {
        by_link.entry(event.link_id).or_default().push(LinkEventRecord {
            event_type: event.event_type,
            page_url: event.page_url,
            product_id: event.product_id,
            timestamp: event.timestamp,
        });
    }

    let now = Utc::now();
    let items = links
        .into_iter()
        .map(|link| {
            let engagement = by_link
                .get(&link.id)
                .map(|events| summarize_link_events(events))
                .unwrap_or_default();
            LinkAnalyticsItem {
                link_id: link.id,
                contact_name: link.contact_name,
                contact_phone: link.contact_phone,
                engagement,
                total_order_value: link.total_order_value,
                created_at: link.created_at,
                link_status: link_status(link.is_active, link.expires_at, now),
            }
        })
        .collect();

    Ok(Json(items))
}

/// GET /api/admin/analytics/summary
pub(super) async fn outreach_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<OutreachSummaryResponse>, ApiError> {
    let now = Utc::now();
    let summary = diwali_db::outreach_summary(&state.pool, now - Duration::days(SUMMARY_WINDOW_DAYS))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(OutreachSummaryResponse {
        total_personalized_links: summary.total_links,
        total_contacts: summary.total_contacts,
        total_tracking_events: summary.total_events,
        recent_links_30_days: summary.recent_links,
        recent_events_30_days: summary.recent_events,
        last_updated: now,
    }))
}

/// POST /api/admin/message-templates — variables default to the template's
/// `{placeholders}`.
pub(super) async fn create_message_template(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateItem>), ApiError> {
    let rid = &req_id.0;
    let name = require_text(rid, "name", &body.name)?;
    let message = require_text(rid, "message", &body.message)?;
    let variables = body
        .variables
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| template_variables(message));

    let row = diwali_db::create_message_template(&state.pool, name, message, &variables)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /api/admin/message-templates
pub(super) async fn list_message_templates(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<TemplateItem>>, ApiError> {
    let rows = diwali_db::list_message_templates(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(TemplateItem::from).collect()))
}
