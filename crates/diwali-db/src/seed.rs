//! Sample orders and visitor sessions for exercising the admin panel by hand.

use chrono::{Duration, Utc};
use diwali_core::catalog::DEFAULT_UNIT;
use diwali_core::orders::{items_subtotal, OrderItem};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::orders::{insert_order, NewOrder};
use crate::DbError;

struct SampleOrder {
    name: &'static str,
    phone: &'static str,
    email: &'static str,
    address: &'static str,
    items: &'static [(&'static str, i64, i32, &'static str)],
    delivery_cost: i64,
    delivery_in_days: i64,
    age_hours: i64,
    status: &'static str,
    payment_status: &'static str,
    notes: &'static str,
}

const SAMPLE_ORDERS: &[SampleOrder] = &[
    SampleOrder {
        name: "Priya Sharma",
        phone: "+91-9876543210",
        email: "priya.sharma@email.com",
        address: "123 MG Road, Bangalore, Karnataka 560001",
        items: &[
            ("Special Diwali Mix", 450, 2, DEFAULT_UNIT),
            ("Kaju Katli", 800, 1, DEFAULT_UNIT),
        ],
        delivery_cost: 50,
        delivery_in_days: 2,
        age_hours: 0,
        status: "confirmed",
        payment_status: "paid",
        notes: "Please deliver before 6 PM",
    },
    SampleOrder {
        name: "Rajesh Kumar",
        phone: "+91-9876543211",
        email: "rajesh.kumar@email.com",
        address: "456 Brigade Road, Bangalore, Karnataka 560025",
        items: &[("Samosa Chivda", 320, 1, DEFAULT_UNIT)],
        delivery_cost: 30,
        delivery_in_days: 1,
        age_hours: 24,
        status: "pending",
        payment_status: "pending",
        notes: "First time customer",
    },
    SampleOrder {
        name: "Anita Patel",
        phone: "+91-9876543212",
        email: "anita.patel@email.com",
        address: "789 Commercial Street, Bangalore, Karnataka 560001",
        items: &[
            ("Besan Laddu", 600, 1, DEFAULT_UNIT),
            ("Murukku", 250, 2, "per pack"),
        ],
        delivery_cost: 40,
        delivery_in_days: 3,
        age_hours: 5,
        status: "preparing",
        payment_status: "paid",
        notes: "Regular customer, prefers morning delivery",
    },
];

/// Sessions as (visitor type, phone, page views, seconds, cart adds,
/// checkouts, orders, age in hours).
const SAMPLE_SESSIONS: &[(&str, Option<&str>, i32, i64, i32, i32, i32, i64)] = &[
    ("anonymous", None, 5, 450, 2, 0, 0, 2),
    ("customer", Some("+91-9876543210"), 8, 720, 3, 1, 1, 4),
];

/// Inserts the sample orders and visitor sessions in one transaction.
///
/// Does nothing and returns 0 when any sample customer already has an order,
/// so running it twice is harmless. Otherwise returns the number of orders
/// inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the batch is rolled back.
pub async fn seed_sample_data(pool: &PgPool) -> Result<usize, DbError> {
    let phones: Vec<&str> = SAMPLE_ORDERS.iter().map(|o| o.phone).collect();
    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_phone = ANY($1)")
            .bind(phones.as_slice())
            .fetch_one(pool)
            .await?;
    if existing > 0 {
        tracing::info!(existing, "sample orders already present; skipping seed");
        return Ok(0);
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for sample in SAMPLE_ORDERS {
        let items: Vec<OrderItem> = sample
            .items
            .iter()
            .map(|(name, price, quantity, unit)| OrderItem {
                product_id: Uuid::new_v4().to_string(),
                product_name: (*name).to_string(),
                price: Decimal::from(*price),
                quantity: *quantity,
                unit: (*unit).to_string(),
            })
            .collect();

        insert_order(
            &mut *tx,
            &NewOrder {
                customer_name: sample.name,
                customer_phone: sample.phone,
                customer_email: Some(sample.email),
                customer_address: sample.address,
                delivery_date: now + Duration::days(sample.delivery_in_days),
                items: &items,
                total_amount: items_subtotal(&items),
                delivery_cost: Decimal::from(sample.delivery_cost),
                status: sample.status,
                delivery_status: "pending",
                payment_status: sample.payment_status,
                referral_link_token: None,
                notes: Some(sample.notes),
                created_at: Some(now - Duration::hours(sample.age_hours)),
            },
        )
        .await?;
    }

    for (visitor_type, phone, page_views, seconds, cart_adds, checkouts, orders, age_hours) in
        SAMPLE_SESSIONS
    {
        let first_visit = now - Duration::hours(*age_hours);
        sqlx::query(
            "INSERT INTO visitor_sessions \
                 (session_id, visitor_type, customer_phone, first_visit, last_activity, \
                  page_views, time_spent_seconds, cart_additions, checkout_attempts, \
                  orders_placed, converted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(Uuid::new_v4().simple().to_string())
        .bind(*visitor_type)
        .bind(*phone)
        .bind(first_visit)
        .bind(first_visit + Duration::hours(1))
        .bind(*page_views)
        .bind(*seconds)
        .bind(*cart_adds)
        .bind(*checkouts)
        .bind(*orders)
        .bind(*orders > 0)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        orders = SAMPLE_ORDERS.len(),
        sessions = SAMPLE_SESSIONS.len(),
        "seeded sample data"
    );
    Ok(SAMPLE_ORDERS.len())
}
