mod analytics;
mod contacts;
mod orders;
mod outreach;
mod products;
mod reviews;
mod tracking;

use std::{str::FromStr, sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diwali_core::{AppConfig, CoreError};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::middleware::{
    enforce_rate_limit, request_id, require_admin_key, AuthState, RateLimitState,
};

/// Uploaded images can be larger than axum's 2 MiB default body limit.
const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

/// Body for ingestion endpoints that only acknowledge receipt.
#[derive(Debug, Serialize)]
pub(super) struct StatusResponse {
    pub status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Apply `default` when absent and clamp into `1..=max`.
pub(super) fn normalize_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

pub(super) fn map_db_error(request_id: String, error: &diwali_db::DbError) -> ApiError {
    match error {
        diwali_db::DbError::NotFound => ApiError::new(request_id, "not_found", "resource not found"),
        e if e.is_unique_violation() => {
            ApiError::new(request_id, "conflict", "resource already exists")
        }
        diwali_db::DbError::Sqlx(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some("23514") =>
        {
            ApiError::new(request_id, "validation_error", "value out of allowed range")
        }
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// Like [`map_db_error`] but with a caller-specific not-found message.
pub(super) fn map_db_error_for(
    request_id: &str,
    error: &diwali_db::DbError,
    not_found: &str,
) -> ApiError {
    if matches!(error, diwali_db::DbError::NotFound) {
        ApiError::new(request_id, "not_found", not_found)
    } else {
        map_db_error(request_id.to_owned(), error)
    }
}

pub(super) fn map_core_error(request_id: &str, error: &CoreError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

/// Path ids that are not UUIDs cannot name a stored record.
pub(super) fn parse_id(request_id: &str, raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::new(request_id, "not_found", format!("{what} not found")))
}

pub(super) fn parse_enum<T>(request_id: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = CoreError>,
{
    raw.parse::<T>().map_err(|e| map_core_error(request_id, &e))
}

/// Reject blank values for required text fields.
pub(super) fn require_text<'a>(
    request_id: &str,
    field: &str,
    value: &'a str,
) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            format!("{field} must not be empty"),
        ));
    }
    Ok(trimmed)
}

/// Deserializes a present field (including `null`) as `Some(..)`, so a PATCH
/// body can tell "absent" apart from "explicitly cleared".
#[allow(clippy::option_option)]
pub(super) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/products", get(products::list_storefront_products))
        .route("/api/orders", post(orders::create_order))
        .route("/api/track/link-event", post(outreach::track_link_event))
        .route(
            "/api/track/visitor-session",
            post(tracking::track_visitor_session),
        )
        .route("/api/track/visitor-event", post(tracking::track_visitor_event))
        .route(
            "/api/track/cart-abandonment",
            post(tracking::track_cart_abandonment),
        )
        .route(
            "/api/reviews",
            get(reviews::list_public_reviews).post(reviews::submit_review),
        )
}

fn admin_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/admin/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/api/admin/upload-image",
            post(products::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/admin/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route(
            "/api/admin/contacts/bulk-import",
            post(contacts::bulk_import_contacts),
        )
        .route(
            "/api/admin/contacts/{id}",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route(
            "/api/admin/personalized-links",
            get(outreach::list_links).post(outreach::create_personalized_link),
        )
        .route(
            "/api/admin/personalized-links/{id}/deactivate",
            put(outreach::deactivate_link),
        )
        .route(
            "/api/admin/send-personalized-message",
            post(outreach::send_personalized_message),
        )
        .route(
            "/api/admin/message-templates",
            get(outreach::list_message_templates).post(outreach::create_message_template),
        )
        .route("/api/admin/analytics/links", get(outreach::link_analytics))
        .route("/api/admin/analytics/summary", get(outreach::outreach_summary))
        .route("/api/admin/orders", get(orders::list_orders))
        .route(
            "/api/admin/orders/{id}",
            get(orders::get_order).put(orders::update_order),
        )
        .route(
            "/api/admin/orders/customer/{phone}",
            get(orders::list_customer_orders),
        )
        .route(
            "/api/admin/analytics/visitors",
            get(analytics::visitor_analytics),
        )
        .route(
            "/api/admin/analytics/customers",
            get(analytics::customer_analytics),
        )
        .route(
            "/api/admin/analytics/cart-abandonment",
            get(analytics::cart_abandonment_report),
        )
        .route(
            "/api/admin/analytics/revenue-report",
            get(analytics::revenue_report),
        )
        .route(
            "/api/admin/cart-abandonment/{id}/recovery-attempt",
            post(analytics::record_recovery_attempt),
        )
        .route(
            "/api/admin/cart-abandonment/{id}/recovered",
            put(analytics::mark_cart_recovered),
        )
        .route("/api/admin/reviews", get(reviews::list_all_reviews))
        .route("/api/admin/reviews/summary", get(reviews::review_summary))
        .route(
            "/api/admin/reviews/send-requests",
            post(reviews::send_review_requests),
        )
        .route("/api/admin/reviews/requests", get(reviews::list_review_requests))
        .route(
            "/api/admin/reviews/requests/{id}/status",
            put(reviews::update_review_request_status),
        )
        .route("/api/admin/reviews/stats", get(reviews::review_stats))
        .route(
            "/api/admin/reviews/generate-links/{order_id}",
            get(reviews::generate_review_links),
        )
        .route(
            "/api/admin/reviews/{id}/moderation",
            put(reviews::moderate_review),
        )
        .layer(axum::middleware::from_fn_with_state(auth, require_admin_key))
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let uploads = ServeDir::new(&state.config.uploads_dir);

    Router::new()
        .merge(public_router())
        .merge(admin_router(auth))
        .nest_service("/uploads", uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                )),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match diwali_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthData {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthData {
                    status: "degraded",
                    database: "unavailable",
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{
        net::{IpAddr, Ipv4Addr, SocketAddr},
        path::PathBuf,
        sync::Arc,
    };

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use diwali_core::{AppConfig, Environment};
    use tower::ServiceExt;

    use super::{build_app, default_rate_limit_state, AppState};
    use crate::middleware::AuthState;

    pub const ADMIN_KEY: &str = "test-admin-key";

    pub fn test_config(uploads_dir: PathBuf) -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".to_string(),
            env: Environment::Test,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            log_level: "info".to_string(),
            admin_key: ADMIN_KEY.to_string(),
            app_domain: "localhost:3000".to_string(),
            uploads_dir,
            link_expiry_days: 30,
            db_max_connections: 5,
            db_min_connections: 1,
            db_acquire_timeout_secs: 5,
        }
    }

    pub fn test_app(pool: sqlx::PgPool) -> Router {
        let uploads = std::env::temp_dir().join(format!("diwali-uploads-{}", uuid::Uuid::new_v4()));
        let config = Arc::new(test_config(uploads));
        let auth = AuthState::new(ADMIN_KEY).expect("auth");
        build_app(AppState { pool, config }, auth, default_rate_limit_state())
    }

    /// Appends the admin key to an admin path.
    pub fn admin(path: &str) -> String {
        let sep = if path.contains('?') { '&' } else { '?' };
        format!("{path}{sep}admin_key={ADMIN_KEY}")
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json parse")
        };
        (status, json)
    }
}
