//! Live integration tests for diwali-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/diwali-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, Utc};
use diwali_core::analytics::SessionTotals;
use diwali_core::orders::OrderItem;
use diwali_core::visitors::SessionCounter;
use diwali_core::DateRange;
use diwali_db::{
    apply_session_event, bulk_insert_contacts, count_abandoned_between,
    count_review_window_orders, create_contact, create_link, create_product,
    create_review_request, deactivate_link, delete_product, ensure_session, find_link_by_token,
    get_order, get_product, insert_cart_abandonment, insert_link_event, insert_order,
    insert_review, list_contacts, list_eligible_orders, list_link_events,
    list_links_with_contacts, list_orders, list_orders_by_phone, list_recent_unrecovered,
    mark_cart_recovered, mark_review_submitted_for_order, moderate_review,
    order_totals_between, outreach_summary, record_recovery_attempt, review_request_counts,
    revenue_breakdown, seed_sample_data, session_totals_between, set_review_request_status,
    update_order, update_product, upsert_session, ContactPatch, DbError, NewCartAbandonment,
    NewContact, NewLinkEvent, NewOrder, NewProduct, NewReview, NewReviewRequest, OrderFilter,
    OrderPatch, ProductPatch, SessionUpsert,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("decimal literal")
}

fn item(name: &str, price: &str, quantity: i32) -> OrderItem {
    OrderItem {
        product_id: format!("prod-{name}"),
        product_name: name.to_string(),
        price: dec(price),
        quantity,
        unit: "per kg".to_string(),
    }
}

fn new_order<'a>(
    phone: &'a str,
    items: &'a [OrderItem],
    total: &str,
    delivery: &str,
) -> NewOrder<'a> {
    NewOrder {
        customer_name: "Test Customer",
        customer_phone: phone,
        customer_email: Some("test@example.com"),
        customer_address: "1 Test Lane",
        delivery_date: Utc::now() + Duration::days(2),
        items,
        total_amount: dec(total),
        delivery_cost: dec(delivery),
        status: "pending",
        delivery_status: "pending",
        payment_status: "pending",
        referral_link_token: None,
        notes: None,
        created_at: None,
    }
}

async fn insert_test_contact(pool: &sqlx::PgPool, name: &str) -> Uuid {
    create_contact(
        pool,
        &NewContact {
            name,
            phone: "+91-9000000000",
            email: None,
            relationship: "friend",
            notes: None,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_contact failed for '{name}': {e}"))
    .id
}

fn wide_range() -> DateRange {
    DateRange::trailing_days(Utc::now() + Duration::minutes(5), 30)
}

// ---------------------------------------------------------------------------
// Section 1: Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn product_crud_round_trip(pool: sqlx::PgPool) {
    let images = vec!["/uploads/a.png".to_string()];
    let created = create_product(
        &pool,
        &NewProduct {
            name: "Kaju Katli",
            category: "sweets",
            images: &images,
            description: "Cashew fudge",
            note: Some("Made fresh"),
            base_price: dec("800"),
            discount_percentage: Some(dec("10")),
            offer_price: None,
            unit: "per kg",
            status: "active",
        },
    )
    .await
    .expect("create_product failed");
    assert_eq!(created.images, images);

    let updated = update_product(
        &pool,
        created.id,
        &ProductPatch {
            name: Some("Kaju Katli Premium"),
            note: Some(None),
            offer_price: Some(Some(dec("650"))),
            ..ProductPatch::default()
        },
    )
    .await
    .expect("update_product failed");
    assert_eq!(updated.name, "Kaju Katli Premium");
    assert_eq!(updated.category, "sweets");
    assert!(updated.note.is_none());
    assert_eq!(updated.offer_price, Some(dec("650")));
    assert_eq!(updated.discount_percentage, Some(dec("10")));
    assert!(updated.updated_at >= created.updated_at);

    delete_product(&pool, created.id)
        .await
        .expect("delete_product failed");
    assert!(matches!(
        get_product(&pool, created.id).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        delete_product(&pool, created.id).await,
        Err(DbError::NotFound)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_rejects_out_of_range_discount(pool: sqlx::PgPool) {
    let result = create_product(
        &pool,
        &NewProduct {
            name: "Chakli",
            category: "namkeen",
            images: &[],
            description: "Crunchy spirals",
            note: None,
            base_price: dec("300"),
            discount_percentage: Some(dec("120")),
            offer_price: None,
            unit: "per kg",
            status: "active",
        },
    )
    .await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));
}

// ---------------------------------------------------------------------------
// Section 2: Outreach
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_import_is_all_or_nothing(pool: sqlx::PgPool) {
    let batch = vec![
        NewContact {
            name: "Asha",
            phone: "+91-1",
            email: None,
            relationship: "family",
            notes: None,
        },
        NewContact {
            name: "Bela",
            phone: "+91-2",
            email: Some("bela@example.com"),
            relationship: "friend",
            notes: Some("neighbour"),
        },
    ];
    let imported = bulk_insert_contacts(&pool, &batch)
        .await
        .expect("bulk insert failed");
    assert_eq!(imported, 2);

    let contacts = list_contacts(&pool).await.expect("list_contacts failed");
    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts[0].name, "Asha");
    assert!(contacts.iter().all(|c| c.last_contacted.is_none()));
}

#[sqlx::test(migrations = "../../migrations")]
async fn contact_patch_clears_nullable_fields(pool: sqlx::PgPool) {
    let id = insert_test_contact(&pool, "Chitra").await;
    let updated = diwali_db::update_contact(
        &pool,
        id,
        &ContactPatch {
            email: Some(Some("chitra@example.com")),
            notes: Some(None),
            ..ContactPatch::default()
        },
    )
    .await
    .expect("update_contact failed");
    assert_eq!(updated.email.as_deref(), Some("chitra@example.com"));
    assert_eq!(updated.name, "Chitra");
}

#[sqlx::test(migrations = "../../migrations")]
async fn link_lifecycle_and_attributed_revenue(pool: sqlx::PgPool) {
    let contact_id = insert_test_contact(&pool, "Deepa").await;
    let expires = Utc::now() + Duration::days(30);
    let link = create_link(&pool, contact_id, "tok123", "Happy Diwali", Some(expires))
        .await
        .expect("create_link failed");
    assert!(link.is_active);

    let found = find_link_by_token(&pool, "tok123")
        .await
        .expect("find_link_by_token failed");
    assert_eq!(found.id, link.id);
    assert!(matches!(
        find_link_by_token(&pool, "missing").await,
        Err(DbError::NotFound)
    ));

    insert_link_event(
        &pool,
        &NewLinkEvent {
            link_id: link.id,
            contact_id,
            event_type: "link_opened",
            page_url: None,
            product_id: None,
            user_agent: Some("test-agent"),
            ip_address: Some("10.0.0.1"),
        },
    )
    .await
    .expect("insert_link_event failed");

    let items = vec![item("Kaju Katli", "800", 1)];
    let mut order = new_order("+91-7", &items, "800", "50");
    order.referral_link_token = Some("tok123");
    insert_order(&pool, &order).await.expect("insert_order failed");

    let overview = list_links_with_contacts(&pool)
        .await
        .expect("list_links_with_contacts failed");
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].contact_name, "Deepa");
    assert_eq!(overview[0].total_order_value, Some(dec("850")));

    let events = list_link_events(&pool, Some(link.id))
        .await
        .expect("list_link_events failed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "link_opened");

    let deactivated = deactivate_link(&pool, link.id)
        .await
        .expect("deactivate_link failed");
    assert!(!deactivated.is_active);

    let summary = outreach_summary(&pool, Utc::now() - Duration::days(30))
        .await
        .expect("outreach_summary failed");
    assert_eq!(summary.total_links, 1);
    assert_eq!(summary.total_contacts, 1);
    assert_eq!(summary.total_events, 1);
    assert_eq!(summary.recent_links, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn link_event_type_is_checked(pool: sqlx::PgPool) {
    let contact_id = insert_test_contact(&pool, "Esha").await;
    let link = create_link(&pool, contact_id, "tok-check", "Hi", None)
        .await
        .expect("create_link failed");
    let result = insert_link_event(
        &pool,
        &NewLinkEvent {
            link_id: link.id,
            contact_id,
            event_type: "teleported",
            page_url: None,
            product_id: None,
            user_agent: None,
            ip_address: None,
        },
    )
    .await;
    assert!(result.is_err());
}

// ---------------------------------------------------------------------------
// Section 3: Orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn final_amount_is_generated(pool: sqlx::PgPool) {
    let items = vec![item("Special Diwali Mix", "450", 2), item("Kaju Katli", "800", 1)];
    let row = insert_order(&pool, &new_order("+91-1", &items, "1700", "50"))
        .await
        .expect("insert_order failed");
    assert_eq!(row.final_amount, dec("1750"));
    assert_eq!(row.items.0, items);
    assert_eq!(row.status, "pending");
}

#[sqlx::test(migrations = "../../migrations")]
async fn dispatch_is_stamped_once(pool: sqlx::PgPool) {
    let items = vec![item("Chakli", "200", 1)];
    let order = insert_order(&pool, &new_order("+91-2", &items, "200", "0"))
        .await
        .expect("insert_order failed");
    assert!(order.dispatched_at.is_none());

    let dispatched = update_order(
        &pool,
        order.id,
        &OrderPatch {
            delivery_status: Some("dispatched"),
            ..OrderPatch::default()
        },
    )
    .await
    .expect("update_order failed");
    let first_stamp = dispatched.dispatched_at.expect("dispatched_at stamped");

    let again = update_order(
        &pool,
        order.id,
        &OrderPatch {
            delivery_status: Some("dispatched"),
            notes: Some(Some("second update")),
            ..OrderPatch::default()
        },
    )
    .await
    .expect("update_order failed");
    assert_eq!(again.dispatched_at, Some(first_stamp));
    assert_eq!(again.notes.as_deref(), Some("second update"));

    let explicit = Utc::now() - Duration::days(1);
    let overridden = update_order(
        &pool,
        order.id,
        &OrderPatch {
            dispatched_at: Some(explicit),
            delivery_cost: Some(dec("40")),
            ..OrderPatch::default()
        },
    )
    .await
    .expect("update_order failed");
    let stamp = overridden.dispatched_at.expect("explicit stamp");
    assert!((stamp - explicit).num_milliseconds().abs() < 1);
    assert_eq!(overridden.final_amount, dec("240"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_missing_order_is_not_found(pool: sqlx::PgPool) {
    let result = update_order(&pool, Uuid::new_v4(), &OrderPatch::default()).await;
    assert!(matches!(result, Err(DbError::NotFound)));
    assert!(matches!(
        get_order(&pool, Uuid::new_v4()).await,
        Err(DbError::NotFound)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_orders_filters_and_orders_newest_first(pool: sqlx::PgPool) {
    let items = vec![item("Murukku", "250", 2)];
    let now = Utc::now();
    for (hours, status) in [(48, "pending"), (24, "confirmed"), (1, "confirmed")] {
        let mut order = new_order("+91-3", &items, "500", "0");
        order.status = status;
        order.created_at = Some(now - Duration::hours(hours));
        insert_order(&pool, &order).await.expect("insert_order failed");
    }

    let confirmed = list_orders(
        &pool,
        &OrderFilter {
            status: Some("confirmed"),
            limit: 100,
            ..OrderFilter::default()
        },
    )
    .await
    .expect("list_orders failed");
    assert_eq!(confirmed.len(), 2);
    assert!(confirmed[0].created_at > confirmed[1].created_at);

    let recent = list_orders(
        &pool,
        &OrderFilter {
            created_from: Some(now - Duration::hours(30)),
            created_to: Some(now),
            limit: 100,
            ..OrderFilter::default()
        },
    )
    .await
    .expect("list_orders failed");
    assert_eq!(recent.len(), 2);

    let capped = list_orders(
        &pool,
        &OrderFilter {
            limit: 1,
            ..OrderFilter::default()
        },
    )
    .await
    .expect("list_orders failed");
    assert_eq!(capped.len(), 1);

    let history = list_orders_by_phone(&pool, "+91-3")
        .await
        .expect("list_orders_by_phone failed");
    assert_eq!(history.len(), 3);
    assert!(list_orders_by_phone(&pool, "+91-none")
        .await
        .expect("list_orders_by_phone failed")
        .is_empty());
}

// ---------------------------------------------------------------------------
// Section 4: Visitor analytics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn session_upsert_keeps_known_identity(pool: sqlx::PgPool) {
    let first = upsert_session(
        &pool,
        &SessionUpsert {
            session_id: "s-1",
            customer_phone: Some("+91-5"),
            ..SessionUpsert::default()
        },
    )
    .await
    .expect("upsert_session failed");
    assert_eq!(first.visitor_type, "anonymous");

    let second = upsert_session(
        &pool,
        &SessionUpsert {
            session_id: "s-1",
            visitor_type: Some("customer"),
            customer_name: Some("Farah"),
            ..SessionUpsert::default()
        },
    )
    .await
    .expect("upsert_session failed");
    assert_eq!(second.visitor_type, "customer");
    assert_eq!(second.customer_phone.as_deref(), Some("+91-5"));
    assert_eq!(second.customer_name.as_deref(), Some("Farah"));
    assert_eq!(second.first_visit, first.first_visit);
    assert!(second.last_activity >= first.last_activity);
}

#[sqlx::test(migrations = "../../migrations")]
async fn session_counters_follow_event_types(pool: sqlx::PgPool) {
    ensure_session(&pool, "s-2").await.expect("ensure_session failed");
    ensure_session(&pool, "s-2").await.expect("ensure_session is idempotent");

    apply_session_event(&pool, "s-2", Some(SessionCounter::PageViews), None, Some(30))
        .await
        .expect("page view");
    apply_session_event(&pool, "s-2", Some(SessionCounter::CartAdditions), None, None)
        .await
        .expect("cart add");
    apply_session_event(&pool, "s-2", None, None, Some(15))
        .await
        .expect("unknown event");
    let row = apply_session_event(
        &pool,
        "s-2",
        Some(SessionCounter::OrdersPlaced),
        Some(dec("1250.50")),
        None,
    )
    .await
    .expect("order complete");

    assert_eq!(row.page_views, 1);
    assert_eq!(row.cart_additions, 1);
    assert_eq!(row.checkout_attempts, 0);
    assert_eq!(row.orders_placed, 1);
    assert_eq!(row.total_order_value, dec("1250.50"));
    assert_eq!(row.time_spent_seconds, 45);
    assert!(row.converted);

    assert!(matches!(
        apply_session_event(&pool, "nope", None, None, None).await,
        Err(DbError::NotFound)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn seeded_data_feeds_visitor_and_revenue_totals(pool: sqlx::PgPool) {
    let inserted = seed_sample_data(&pool).await.expect("seed failed");
    assert_eq!(inserted, 3);
    assert_eq!(seed_sample_data(&pool).await.expect("reseed"), 0);

    let range = wide_range();
    let sessions = session_totals_between(&pool, &range)
        .await
        .expect("session totals");
    assert_eq!(
        sessions,
        SessionTotals {
            sessions: 2,
            unique_sessions: 2,
            returning: 1,
            time_spent_seconds: 1170,
            page_views: 13,
        }
    );

    let orders = order_totals_between(&pool, &range).await.expect("order totals");
    assert_eq!(orders.orders, 3);
    assert_eq!(orders.revenue, dec("3240"));

    let buckets = revenue_breakdown(&pool, &range).await.expect("revenue");
    let total: i64 = buckets.iter().map(|b| b.order_count).sum();
    assert_eq!(total, 3);
    assert!(buckets.iter().all(|b| b.delivery_status == "pending"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancelled_orders_are_left_out_of_revenue(pool: sqlx::PgPool) {
    let items = vec![item("Shakarpara", "300", 1)];
    let mut cancelled = new_order("+91-8", &items, "300", "0");
    cancelled.status = "cancelled";
    insert_order(&pool, &cancelled).await.expect("insert");
    insert_order(&pool, &new_order("+91-8", &items, "300", "20"))
        .await
        .expect("insert");

    let buckets = revenue_breakdown(&pool, &wide_range()).await.expect("revenue");
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].order_count, 1);
    assert_eq!(buckets[0].final_amount, dec("320"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cart_abandonment_recovery_flow(pool: sqlx::PgPool) {
    let items = vec![item("Kaju Katli", "800", 1)];
    let old = insert_cart_abandonment(
        &pool,
        &NewCartAbandonment {
            session_id: "s-old",
            customer_name: None,
            customer_phone: None,
            items: &items,
            cart_total: dec("800"),
            abandonment_stage: "cart",
            abandoned_at: Some(Utc::now() - Duration::days(10)),
        },
    )
    .await
    .expect("insert old cart");
    let fresh = insert_cart_abandonment(
        &pool,
        &NewCartAbandonment {
            session_id: "s-new",
            customer_name: Some("Gita"),
            customer_phone: Some("+91-4"),
            items: &items,
            cart_total: dec("800"),
            abandonment_stage: "checkout",
            abandoned_at: None,
        },
    )
    .await
    .expect("insert fresh cart");

    let recent = list_recent_unrecovered(&pool, Utc::now() - Duration::days(7))
        .await
        .expect("list recent");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, fresh.id);
    assert_ne!(recent[0].id, old.id);

    let attempted = record_recovery_attempt(&pool, fresh.id)
        .await
        .expect("recovery attempt");
    assert_eq!(attempted.recovery_attempts, 1);
    assert!(attempted.last_recovery_attempt_at.is_some());

    let order = insert_order(&pool, &new_order("+91-4", &items, "800", "0"))
        .await
        .expect("insert order");
    let recovered = mark_cart_recovered(&pool, fresh.id, order.id)
        .await
        .expect("mark recovered");
    assert!(recovered.recovered);
    assert_eq!(recovered.recovery_order_id, Some(order.id));

    let after = list_recent_unrecovered(&pool, Utc::now() - Duration::days(7))
        .await
        .expect("list recent");
    assert!(after.is_empty());

    let abandoned = count_abandoned_between(&pool, &wide_range())
        .await
        .expect("count abandoned");
    assert_eq!(abandoned, 2);
}

// ---------------------------------------------------------------------------
// Section 5: Reviews
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn review_request_is_unique_per_order(pool: sqlx::PgPool) {
    let items = vec![item("Besan Laddu", "600", 1)];
    let mut delivered = new_order("+91-6", &items, "600", "40");
    delivered.status = "delivered";
    let order = insert_order(&pool, &delivered).await.expect("insert order");

    let since = Utc::now() - Duration::days(30);
    assert_eq!(count_review_window_orders(&pool, since).await.expect("count"), 1);
    assert_eq!(list_eligible_orders(&pool, since).await.expect("eligible").len(), 1);

    let products = vec!["Besan Laddu".to_string()];
    let request = NewReviewRequest {
        order_id: order.id,
        customer_name: &order.customer_name,
        customer_phone: &order.customer_phone,
        order_date: order.created_at,
        products_ordered: &products,
        request_method: "whatsapp",
    };
    let created = create_review_request(&pool, &request)
        .await
        .expect("create request")
        .expect("first request is inserted");
    assert_eq!(created.status, "sent");
    assert!(created.request_sent_date.is_some());

    assert!(create_review_request(&pool, &request)
        .await
        .expect("second create")
        .is_none());
    assert!(list_eligible_orders(&pool, since).await.expect("eligible").is_empty());

    let reviewed = set_review_request_status(&pool, created.id, "reviewed", true)
        .await
        .expect("set status");
    assert!(reviewed.review_submitted);
    assert!(reviewed.review_submitted_date.is_some());

    let expired = set_review_request_status(&pool, created.id, "expired", false)
        .await
        .expect("set status");
    assert!(!expired.review_submitted);
    assert!(expired.review_submitted_date.is_none());

    let counts = review_request_counts(&pool).await.expect("counts");
    assert_eq!(counts.total, 1);
    assert_eq!(counts.submitted, 0);
    assert_eq!(counts.orders, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn submitting_a_review_closes_the_request(pool: sqlx::PgPool) {
    let items = vec![item("Karanji", "500", 1)];
    let order = insert_order(&pool, &new_order("+91-9", &items, "500", "0"))
        .await
        .expect("insert order");
    let products = vec!["Karanji".to_string()];
    create_review_request(
        &pool,
        &NewReviewRequest {
            order_id: order.id,
            customer_name: "Test Customer",
            customer_phone: "+91-9",
            order_date: order.created_at,
            products_ordered: &products,
            request_method: "sms",
        },
    )
    .await
    .expect("create request");

    let review = insert_review(
        &pool,
        &NewReview {
            order_id: order.id,
            customer_name: "Test Customer",
            customer_phone: "+91-9",
            product_id: "prod-Karanji",
            product_name: "Karanji",
            overall_rating: 5,
            taste_rating: Some(5),
            packaging_rating: None,
            delivery_rating: Some(4),
            comment: "Lovely",
        },
    )
    .await
    .expect("insert review");
    assert!(!review.approved);
    assert!(!review.display_on_website);

    assert!(mark_review_submitted_for_order(&pool, order.id)
        .await
        .expect("mark submitted"));
    assert!(!mark_review_submitted_for_order(&pool, order.id)
        .await
        .expect("mark submitted again"));

    let moderated = moderate_review(&pool, review.id, Some(true), None)
        .await
        .expect("moderate");
    assert!(moderated.approved);
    assert!(!moderated.display_on_website);
}
