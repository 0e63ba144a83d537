//! Reporting math shared by the analytics endpoints.
//!
//! The database layer does the heavy grouping; these functions derive ratios
//! and rollups from the aggregated numbers so the arithmetic lives in one
//! testable place.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::DateRange;

text_enum! {
    pub enum CustomerType("customer type") {
        New => "new",
        Returning => "returning",
    }
}

/// Aggregates over visitor sessions whose first visit falls in a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTotals {
    pub sessions: i64,
    pub unique_sessions: i64,
    pub returning: i64,
    pub time_spent_seconds: i64,
    pub page_views: i64,
}

/// Aggregates over orders created in a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderTotals {
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitorMetrics {
    pub date_range: DateRange,
    pub total_visitors: i64,
    pub unique_visitors: i64,
    pub returning_visitors: i64,
    pub new_visitors: i64,
    /// Seconds.
    pub avg_session_duration: f64,
    pub pages_per_session: f64,
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub avg_order_value: Decimal,
    pub conversion_rate: f64,
    pub abandoned_carts: i64,
}

/// Orders divided by sessions, as a percentage. Zero sessions yields zero.
#[must_use]
pub fn conversion_rate(orders: i64, sessions: i64) -> f64 {
    if sessions == 0 {
        return 0.0;
    }
    ratio(orders, sessions) * 100.0
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn average_money(total: Decimal, count: i64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    }
}

/// Combine session and order aggregates into the visitor dashboard.
///
/// Orders are counted by creation date and sessions by first visit, so the
/// conversion rate compares two overlapping but distinct populations.
#[must_use]
pub fn visitor_metrics(
    date_range: DateRange,
    sessions: SessionTotals,
    orders: OrderTotals,
    abandoned_carts: i64,
) -> VisitorMetrics {
    VisitorMetrics {
        date_range,
        total_visitors: sessions.sessions,
        unique_visitors: sessions.unique_sessions,
        returning_visitors: sessions.returning,
        new_visitors: (sessions.sessions - sessions.returning).max(0),
        avg_session_duration: ratio(sessions.time_spent_seconds, sessions.sessions),
        pages_per_session: ratio(sessions.page_views, sessions.sessions),
        total_orders: orders.orders,
        total_revenue: orders.revenue,
        avg_order_value: average_money(orders.revenue, orders.orders),
        conversion_rate: conversion_rate(orders.orders, sessions.sessions),
        abandoned_carts,
    }
}

/// The fields of an order that customer analytics needs.
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub customer_phone: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub final_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerMetrics {
    /// Customers are keyed by phone number.
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_type: CustomerType,
    pub total_orders: i64,
    pub total_spent: Decimal,
    pub avg_order_value: Decimal,
    pub first_order_date: DateTime<Utc>,
    pub last_order_date: DateTime<Utc>,
    pub avg_days_between_orders: Option<f64>,
}

struct CustomerAccumulator<'a> {
    latest: &'a OrderSnapshot,
    count: i64,
    total: Decimal,
    first: DateTime<Utc>,
    last: DateTime<Utc>,
}

/// Group orders by phone number into lifetime-value rows, biggest spenders
/// first. Name and email come from the customer's most recent order.
#[must_use]
pub fn customer_analytics(orders: &[OrderSnapshot]) -> Vec<CustomerMetrics> {
    let mut by_phone: HashMap<&str, CustomerAccumulator<'_>> = HashMap::new();

    for order in orders {
        by_phone
            .entry(order.customer_phone.as_str())
            .and_modify(|acc| {
                acc.count += 1;
                acc.total += order.final_amount;
                acc.first = acc.first.min(order.created_at);
                acc.last = acc.last.max(order.created_at);
                if order.created_at >= acc.latest.created_at {
                    acc.latest = order;
                }
            })
            .or_insert(CustomerAccumulator {
                latest: order,
                count: 1,
                total: order.final_amount,
                first: order.created_at,
                last: order.created_at,
            });
    }

    let mut rows: Vec<CustomerMetrics> = by_phone
        .into_iter()
        .map(|(phone, acc)| {
            let avg_days_between_orders = (acc.count > 1).then(|| {
                #[allow(clippy::cast_precision_loss)]
                let span_days = (acc.last - acc.first).num_seconds() as f64 / 86_400.0;
                #[allow(clippy::cast_precision_loss)]
                let gaps = (acc.count - 1) as f64;
                span_days / gaps
            });

            CustomerMetrics {
                customer_id: phone.to_string(),
                customer_name: acc.latest.customer_name.clone(),
                customer_phone: phone.to_string(),
                customer_email: acc.latest.customer_email.clone(),
                customer_type: if acc.count > 1 {
                    CustomerType::Returning
                } else {
                    CustomerType::New
                },
                total_orders: acc.count,
                total_spent: acc.total,
                avg_order_value: average_money(acc.total, acc.count),
                first_order_date: acc.first,
                last_order_date: acc.last,
                avg_days_between_orders,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_spent
            .cmp(&a.total_spent)
            .then_with(|| a.customer_phone.cmp(&b.customer_phone))
    });
    rows
}

/// One (day, delivery status) cell of the revenue report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueBucket {
    pub date: NaiveDate,
    pub delivery_status: String,
    pub order_count: i64,
    pub total_amount: Decimal,
    pub delivery_cost: Decimal,
    pub final_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub total_delivery_revenue: Decimal,
    pub grand_total: Decimal,
}

#[must_use]
pub fn summarize_revenue(buckets: &[RevenueBucket]) -> RevenueSummary {
    buckets
        .iter()
        .fold(RevenueSummary::default(), |mut acc, bucket| {
            acc.total_orders += bucket.order_count;
            acc.total_revenue += bucket.total_amount;
            acc.total_delivery_revenue += bucket.delivery_cost;
            acc.grand_total += bucket.final_amount;
            acc
        })
}
