//! Review solicitation for delivered orders, plus the reviews customers send
//! back and their moderation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use diwali_core::orders::{product_names, OrderItem};
use diwali_core::reviews::{
    average_rating, response_rate, review_links, review_request_message, validate_ratings,
    RequestMethod, ReviewLinks, ReviewStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_core_error, map_db_error, map_db_error_for, normalize_limit, parse_enum, parse_id,
    require_text, ApiError, AppState,
};

const REVIEW_WINDOW_DAYS: i64 = 30;
const ELIGIBLE_PREVIEW: usize = 10;
const DEFAULT_REQUEST_LIMIT: i64 = 50;
const MAX_REQUEST_LIMIT: i64 = 100;
const RECENT_REVIEWS: i64 = 10;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct ReviewRequestItem {
    id: Uuid,
    order_id: Uuid,
    customer_name: String,
    customer_phone: String,
    order_date: DateTime<Utc>,
    products_ordered: Vec<String>,
    request_sent_date: Option<DateTime<Utc>>,
    request_method: Option<String>,
    review_submitted: bool,
    review_submitted_date: Option<DateTime<Utc>>,
    status: String,
}

impl From<diwali_db::ReviewRequestRow> for ReviewRequestItem {
    fn from(row: diwali_db::ReviewRequestRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            order_date: row.order_date,
            products_ordered: row.products_ordered,
            request_sent_date: row.request_sent_date,
            request_method: row.request_method,
            review_submitted: row.review_submitted,
            review_submitted_date: row.review_submitted_date,
            status: row.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewItem {
    id: Uuid,
    order_id: Uuid,
    customer_name: String,
    customer_phone: String,
    product_id: String,
    product_name: String,
    overall_rating: i32,
    taste_rating: Option<i32>,
    packaging_rating: Option<i32>,
    delivery_rating: Option<i32>,
    comment: String,
    review_date: DateTime<Utc>,
    approved: bool,
    display_on_website: bool,
}

impl From<diwali_db::ReviewRow> for ReviewItem {
    fn from(row: diwali_db::ReviewRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            product_id: row.product_id,
            product_name: row.product_name,
            overall_rating: row.overall_rating,
            taste_rating: row.taste_rating,
            packaging_rating: row.packaging_rating,
            delivery_rating: row.delivery_rating,
            comment: row.comment,
            review_date: row.review_date,
            approved: row.approved,
            display_on_website: row.display_on_website,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct EligibleOrder {
    order_id: Uuid,
    customer_name: String,
    customer_phone: String,
    order_date: DateTime<Utc>,
    total_amount: Decimal,
    items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewRequestSummary {
    total_orders: i64,
    orders_with_requests_sent: i64,
    orders_pending_requests: usize,
    total_reviews_received: i64,
    orders_eligible_for_requests: Vec<EligibleOrder>,
}

#[derive(Debug, Serialize)]
pub(super) struct FailedOrder {
    order_id: String,
    reason: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SendRequestsResponse {
    success: bool,
    requests_sent: usize,
    failed_orders: Vec<FailedOrder>,
    message: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewStats {
    total_requests_sent: i64,
    pending_reviews: i64,
    completed_reviews: i64,
    review_response_rate: f64,
    average_overall_rating: f64,
    recent_reviews: Vec<ReviewItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewLinksResponse {
    order_id: Uuid,
    customer_name: String,
    customer_phone: String,
    links: ReviewLinks,
    message_preview: String,
}

#[derive(Debug, Serialize)]
pub(super) struct StatusUpdateResponse {
    success: bool,
    message: String,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct SendRequestsRequest {
    pub order_ids: Vec<String>,
    pub request_method: String,
    /// Accepted for compatibility with older admin clients; the thank-you
    /// note is always the standard one.
    #[allow(dead_code)]
    pub message_template: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RequestListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusQuery {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubmitReviewRequest {
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub overall_rating: i32,
    pub taste_rating: Option<i32>,
    pub packaging_rating: Option<i32>,
    pub delivery_rating: Option<i32>,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ModerationRequest {
    pub approved: Option<bool>,
    pub display_on_website: Option<bool>,
}

// ---------------------------------------------------------------------------
// Admin handlers
// ---------------------------------------------------------------------------

/// GET /api/admin/reviews/summary
pub(super) async fn review_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ReviewRequestSummary>, ApiError> {
    let rid = &req_id.0;
    let since = Utc::now() - Duration::days(REVIEW_WINDOW_DAYS);

    let total_orders = diwali_db::count_review_window_orders(&state.pool, since)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let counts = diwali_db::review_request_counts(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let eligible = diwali_db::list_eligible_orders(&state.pool, since)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let total_reviews = diwali_db::count_reviews(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let orders_pending_requests = eligible.len();
    let preview = eligible
        .into_iter()
        .take(ELIGIBLE_PREVIEW)
        .map(|order| EligibleOrder {
            order_id: order.id,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            order_date: order.created_at,
            total_amount: order.total_amount,
            items: order.items.0,
        })
        .collect();

    Ok(Json(ReviewRequestSummary {
        total_orders,
        orders_with_requests_sent: counts.orders,
        orders_pending_requests,
        total_reviews_received: total_reviews,
        orders_eligible_for_requests: preview,
    }))
}

/// POST /api/admin/reviews/send-requests — each order succeeds or fails on
/// its own; the batch never aborts.
pub(super) async fn send_review_requests(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SendRequestsRequest>,
) -> Result<Json<SendRequestsResponse>, ApiError> {
    let rid = &req_id.0;
    let method = parse_enum::<RequestMethod>(rid, &body.request_method)?;

    let mut requests_sent = 0;
    let mut failed_orders = Vec::new();

    for raw_id in &body.order_ids {
        let fail = |reason: &str| FailedOrder {
            order_id: raw_id.clone(),
            reason: reason.to_string(),
        };

        let Ok(order_id) = Uuid::parse_str(raw_id) else {
            failed_orders.push(fail("Order not found"));
            continue;
        };
        let order = match diwali_db::get_order(&state.pool, order_id).await {
            Ok(order) => order,
            Err(diwali_db::DbError::NotFound) => {
                failed_orders.push(fail("Order not found"));
                continue;
            }
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "loading order for review request failed");
                failed_orders.push(fail(&e.to_string()));
                continue;
            }
        };

        let products = product_names(&order.items.0);
        let created = match diwali_db::create_review_request(
            &state.pool,
            &diwali_db::NewReviewRequest {
                order_id,
                customer_name: &order.customer_name,
                customer_phone: &order.customer_phone,
                order_date: order.created_at,
                products_ordered: &products,
                request_method: method.as_str(),
            },
        )
        .await
        {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(order_id = %order_id, error = %e, "storing review request failed");
                failed_orders.push(fail(&e.to_string()));
                continue;
            }
        };

        if created.is_some() {
            requests_sent += 1;
        } else {
            failed_orders.push(fail("Review request already sent"));
        }
    }

    tracing::info!(
        requests_sent,
        failed = failed_orders.len(),
        method = %method,
        "review requests processed"
    );

    Ok(Json(SendRequestsResponse {
        success: true,
        requests_sent,
        message: format!("Successfully sent {requests_sent} review requests via {method}"),
        failed_orders,
    }))
}

/// GET /api/admin/reviews/requests
pub(super) async fn list_review_requests(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Vec<ReviewRequestItem>>, ApiError> {
    let rid = &req_id.0;
    let status = query
        .status
        .as_deref()
        .map(|raw| parse_enum::<ReviewStatus>(rid, raw))
        .transpose()?;
    let limit = normalize_limit(query.limit, DEFAULT_REQUEST_LIMIT, MAX_REQUEST_LIMIT);

    let rows = diwali_db::list_review_requests(&state.pool, status.map(ReviewStatus::as_str), limit)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(rows.into_iter().map(ReviewRequestItem::from).collect()))
}

/// PUT /api/admin/reviews/requests/{id}/status?status=
pub(super) async fn update_review_request_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let rid = &req_id.0;
    let status = parse_enum::<ReviewStatus>(rid, &query.status)?;
    let id = parse_id(rid, &id, "review request")?;

    diwali_db::set_review_request_status(&state.pool, id, status.as_str(), status.is_submitted())
        .await
        .map_err(|e| map_db_error_for(rid, &e, "review request not found"))?;

    Ok(Json(StatusUpdateResponse {
        success: true,
        message: format!("Review request status updated to {status}"),
    }))
}

/// GET /api/admin/reviews/stats
pub(super) async fn review_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ReviewStats>, ApiError> {
    let rid = &req_id.0;
    let counts = diwali_db::review_request_counts(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let recent = diwali_db::list_recent_reviews(&state.pool, RECENT_REVIEWS)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let ratings: Vec<i32> = recent.iter().map(|r| r.overall_rating).collect();

    Ok(Json(ReviewStats {
        total_requests_sent: counts.total,
        pending_reviews: counts.total - counts.submitted,
        completed_reviews: counts.submitted,
        review_response_rate: response_rate(counts.submitted, counts.total),
        average_overall_rating: average_rating(&ratings),
        recent_reviews: recent.into_iter().map(ReviewItem::from).collect(),
    }))
}

/// GET /api/admin/reviews/generate-links/{order_id}
pub(super) async fn generate_review_links(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_id): Path<String>,
) -> Result<Json<ReviewLinksResponse>, ApiError> {
    let rid = &req_id.0;
    let order_id = parse_id(rid, &order_id, "order")?;
    let order = diwali_db::get_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "order not found"))?;

    let message = review_request_message(&order.customer_name, &product_names(&order.items.0));
    let links = review_links(
        &message,
        &order.customer_phone,
        order.customer_email.as_deref(),
    );

    Ok(Json(ReviewLinksResponse {
        order_id: order.id,
        customer_name: order.customer_name,
        customer_phone: order.customer_phone,
        links,
        message_preview: message,
    }))
}

/// GET /api/admin/reviews — every review, newest first.
pub(super) async fn list_all_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<ReviewItem>>, ApiError> {
    let rows = diwali_db::list_reviews(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(ReviewItem::from).collect()))
}

/// PUT /api/admin/reviews/{id}/moderation
pub(super) async fn moderate_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<ModerationRequest>,
) -> Result<Json<ReviewItem>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "review")?;
    let row = diwali_db::moderate_review(&state.pool, id, body.approved, body.display_on_website)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "review not found"))?;
    Ok(Json(row.into()))
}

// ---------------------------------------------------------------------------
// Public handlers
// ---------------------------------------------------------------------------

/// GET /api/reviews — approved reviews shown on the storefront.
pub(super) async fn list_public_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<Vec<ReviewItem>>, ApiError> {
    let rows = diwali_db::list_displayed_reviews(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(Json(rows.into_iter().map(ReviewItem::from).collect()))
}

/// POST /api/reviews
pub(super) async fn submit_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<ReviewItem>), ApiError> {
    let rid = &req_id.0;
    validate_ratings(
        body.overall_rating,
        body.taste_rating,
        body.packaging_rating,
        body.delivery_rating,
    )
    .map_err(|e| map_core_error(rid, &e))?;
    let comment = require_text(rid, "comment", &body.comment)?;
    let product_id = require_text(rid, "product_id", &body.product_id)?;
    let product_name = require_text(rid, "product_name", &body.product_name)?;

    let order_id = parse_id(rid, &body.order_id, "order")?;
    let order = diwali_db::get_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error_for(rid, &e, "order not found"))?;

    let row = diwali_db::insert_review(
        &state.pool,
        &diwali_db::NewReview {
            order_id,
            customer_name: &order.customer_name,
            customer_phone: &order.customer_phone,
            product_id,
            product_name,
            overall_rating: body.overall_rating,
            taste_rating: body.taste_rating,
            packaging_rating: body.packaging_rating,
            delivery_rating: body.delivery_rating,
            comment,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let closed = diwali_db::mark_review_submitted_for_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(review_id = %row.id, %order_id, request_closed = closed, "review submitted");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::Router;
    use serde_json::{json, Value};

    use super::super::test_support::{admin, send, test_app};

    async fn delivered_order(app: &Router, name: &str, phone: &str) -> String {
        let (status, order) = send(
            app,
            "POST",
            "/api/orders",
            Some(json!({
                "customer_name": name,
                "customer_phone": phone,
                "customer_email": "guest@example.com",
                "customer_address": "7 Temple Street",
                "delivery_date": "2030-11-01T10:00:00Z",
                "items": [
                    { "product_id": "p1", "product_name": "Kaju Katli", "price": "800", "quantity": 1, "unit": "per kg" },
                    { "product_id": "p2", "product_name": "Chakli", "price": "200", "quantity": 2, "unit": "per kg" }
                ],
                "total_amount": "1200"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = order["id"].as_str().expect("order id").to_string();

        let (status, _) = send(
            app,
            "PUT",
            &admin(&format!("/api/admin/orders/{id}")),
            Some(json!({ "status": "delivered", "delivery_status": "delivered" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    fn review_body(order_id: &str, overall: i32) -> Value {
        json!({
            "order_id": order_id,
            "product_id": "p1",
            "product_name": "Kaju Katli",
            "overall_rating": overall,
            "taste_rating": 5,
            "comment": "Fresh and not too sweet"
        })
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn batch_reports_duplicates_without_aborting(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let first = delivered_order(&app, "Meera", "+91-5").await;
        let second = delivered_order(&app, "Kavya", "+91-6").await;

        let (_, summary) = send(&app, "GET", &admin("/api/admin/reviews/summary"), None).await;
        assert_eq!(summary["total_orders"], 2);
        assert_eq!(summary["orders_pending_requests"], 2);
        assert_eq!(summary["orders_with_requests_sent"], 0);

        let (status, body) = send(
            &app,
            "POST",
            &admin("/api/admin/reviews/send-requests"),
            Some(json!({ "order_ids": [first], "request_method": "whatsapp" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requests_sent"], 1);

        let (status, body) = send(
            &app,
            "POST",
            &admin("/api/admin/reviews/send-requests"),
            Some(json!({ "order_ids": [second, first], "request_method": "sms" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["requests_sent"], 1);
        let failed = body["failed_orders"].as_array().expect("failures");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["order_id"], first.as_str());

        let (_, summary) = send(&app, "GET", &admin("/api/admin/reviews/summary"), None).await;
        assert_eq!(summary["orders_with_requests_sent"], 2);
        assert_eq!(summary["orders_pending_requests"], 0);

        let (_, requests) = send(
            &app,
            "GET",
            &admin("/api/admin/reviews/requests?status=sent"),
            None,
        )
        .await;
        let requests = requests.as_array().expect("requests");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["products_ordered"], json!(["Kaju Katli", "Chakli"]));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn store_failure_on_one_order_leaves_the_rest_of_the_batch(pool: sqlx::PgPool) {
        sqlx::raw_sql(
            "CREATE FUNCTION reject_boom() RETURNS trigger AS $$ \
             BEGIN \
                 IF NEW.customer_name = 'Boom' THEN \
                     RAISE EXCEPTION 'review request store unavailable'; \
                 END IF; \
                 RETURN NEW; \
             END; $$ LANGUAGE plpgsql; \
             CREATE TRIGGER reject_boom BEFORE INSERT ON review_requests \
                 FOR EACH ROW EXECUTE FUNCTION reject_boom();",
        )
        .execute(&pool)
        .await
        .expect("install trigger");

        let app = test_app(pool);
        let failing = delivered_order(&app, "Boom", "+91-7").await;
        let healthy = delivered_order(&app, "Kavya", "+91-6").await;

        let (status, body) = send(
            &app,
            "POST",
            &admin("/api/admin/reviews/send-requests"),
            Some(json!({ "order_ids": [failing, healthy], "request_method": "whatsapp" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["requests_sent"], 1);
        assert_eq!(body["message"], "Successfully sent 1 review requests via whatsapp");
        let failed = body["failed_orders"].as_array().expect("failures");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["order_id"], failing.as_str());
        assert!(failed[0]["reason"]
            .as_str()
            .is_some_and(|r| r.contains("review request store unavailable")));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_orders_and_methods_are_reported(pool: sqlx::PgPool) {
        let app = test_app(pool);

        let (status, body) = send(
            &app,
            "POST",
            &admin("/api/admin/reviews/send-requests"),
            Some(json!({
                "order_ids": ["not-a-uuid", "00000000-0000-0000-0000-000000000000"],
                "request_method": "email"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requests_sent"], 0);
        assert_eq!(body["failed_orders"].as_array().map(Vec::len), Some(2));

        let (status, body) = send(
            &app,
            "POST",
            &admin("/api/admin/reviews/send-requests"),
            Some(json!({ "order_ids": [], "request_method": "pigeon" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn status_updates_drive_submission_flag(pool: sqlx::PgPool) {
        let app = test_app(pool.clone());
        let order_id = delivered_order(&app, "Meera", "+91-5").await;
        send(
            &app,
            "POST",
            &admin("/api/admin/reviews/send-requests"),
            Some(json!({ "order_ids": [order_id], "request_method": "whatsapp" })),
        )
        .await;
        let (_, requests) = send(&app, "GET", &admin("/api/admin/reviews/requests"), None).await;
        let request_id = requests[0]["id"].as_str().expect("request id").to_string();

        let (status, body) = send(
            &app,
            "PUT",
            &admin(&format!(
                "/api/admin/reviews/requests/{request_id}/status?status=reviewed"
            )),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Review request status updated to reviewed");

        let id = request_id.parse().expect("uuid");
        let row = diwali_db::get_review_request(&pool, id).await.expect("request");
        assert!(row.review_submitted);
        assert!(row.review_submitted_date.is_some());

        send(
            &app,
            "PUT",
            &admin(&format!(
                "/api/admin/reviews/requests/{request_id}/status?status=expired"
            )),
            None,
        )
        .await;
        let row = diwali_db::get_review_request(&pool, id).await.expect("request");
        assert!(!row.review_submitted);
        assert!(row.review_submitted_date.is_none());

        let (status, _) = send(
            &app,
            "PUT",
            &admin(&format!(
                "/api/admin/reviews/requests/{request_id}/status?status=lost"
            )),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn generated_links_are_encoded(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let order_id = delivered_order(&app, "Meera", "+91 98200-12345").await;

        let (status, body) = send(
            &app,
            "GET",
            &admin(&format!("/api/admin/reviews/generate-links/{order_id}")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let whatsapp = body["links"]["whatsapp"].as_str().expect("whatsapp");
        assert!(whatsapp.starts_with("https://wa.me/919820012345?text="));
        assert!(!whatsapp.contains(' '));
        let sms = body["links"]["sms"].as_str().expect("sms");
        assert!(sms.starts_with("sms:+91 98200-12345?body="));
        let email = body["links"]["email"].as_str().expect("email");
        assert!(email.starts_with("mailto:guest@example.com?subject="));
        assert!(body["message_preview"]
            .as_str()
            .is_some_and(|m| m.contains("Kaju Katli, Chakli")));

        let (status, _) = send(
            &app,
            "GET",
            &admin("/api/admin/reviews/generate-links/00000000-0000-0000-0000-000000000000"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn submitted_review_feeds_stats_and_moderation(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let order_id = delivered_order(&app, "Meera", "+91-5").await;
        send(
            &app,
            "POST",
            &admin("/api/admin/reviews/send-requests"),
            Some(json!({ "order_ids": [order_id], "request_method": "whatsapp" })),
        )
        .await;

        let (status, review) = send(&app, "POST", "/api/reviews", Some(review_body(&order_id, 4))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(review["customer_name"], "Meera");
        assert_eq!(review["approved"], false);

        let (_, stats) = send(&app, "GET", &admin("/api/admin/reviews/stats"), None).await;
        assert_eq!(stats["total_requests_sent"], 1);
        assert_eq!(stats["completed_reviews"], 1);
        assert_eq!(stats["pending_reviews"], 0);
        assert_eq!(stats["review_response_rate"], 100.0);
        assert_eq!(stats["average_overall_rating"], 4.0);

        let (_, public) = send(&app, "GET", "/api/reviews", None).await;
        assert_eq!(public.as_array().map(Vec::len), Some(0));

        let review_id = review["id"].as_str().expect("review id");
        let (status, moderated) = send(
            &app,
            "PUT",
            &admin(&format!("/api/admin/reviews/{review_id}/moderation")),
            Some(json!({ "approved": true, "display_on_website": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moderated["display_on_website"], true);

        let (_, public) = send(&app, "GET", "/api/reviews", None).await;
        assert_eq!(public.as_array().map(Vec::len), Some(1));
        let (_, all) = send(&app, "GET", &admin("/api/admin/reviews"), None).await;
        assert_eq!(all.as_array().map(Vec::len), Some(1));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn invalid_reviews_are_rejected(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let order_id = delivered_order(&app, "Meera", "+91-5").await;

        let (status, _) = send(&app, "POST", "/api/reviews", Some(review_body(&order_id, 6))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut blank = review_body(&order_id, 5);
        blank["comment"] = json!("   ");
        let (status, _) = send(&app, "POST", "/api/reviews", Some(blank)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/reviews",
            Some(review_body("00000000-0000-0000-0000-000000000000", 5)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
