//! Personalized referral links, message templating, and link engagement.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

text_enum! {
    /// Funnel events recorded against a personalized link.
    pub enum LinkEventType("link event type") {
        LinkOpened => "link_opened",
        PageViewed => "page_viewed",
        ItemAdded => "item_added",
        CheckoutStarted => "checkout_started",
        OrderPlaced => "order_placed",
    }
}

text_enum! {
    pub enum LinkStatus("link status") {
        Active => "active",
        Inactive => "inactive",
        Expired => "expired",
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
});

/// 32 lowercase hex characters drawn from a v4 UUID.
#[must_use]
pub fn generate_link_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Public URL that attributes a visit to `token`.
///
/// Local development domains are served over plain HTTP.
#[must_use]
pub fn personalized_url(app_domain: &str, token: &str) -> String {
    let scheme = if app_domain.contains("localhost") {
        "http"
    } else {
        "https"
    };
    let domain = app_domain.trim_end_matches('/');
    format!("{scheme}://{domain}/?ref={token}")
}

/// Expiry for a link issued at `now`. Zero days means the link never expires.
#[must_use]
pub fn link_expiry(now: DateTime<Utc>, expires_in_days: i64) -> Option<DateTime<Utc>> {
    (expires_in_days > 0).then(|| now + Duration::days(expires_in_days))
}

#[must_use]
pub fn link_status(
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> LinkStatus {
    if !is_active {
        LinkStatus::Inactive
    } else if expires_at.is_some_and(|at| at <= now) {
        LinkStatus::Expired
    } else {
        LinkStatus::Active
    }
}

/// Fill `{name}` and `{link}` placeholders. Other placeholders are left as-is.
#[must_use]
pub fn render_message(template: &str, name: &str, link: &str) -> String {
    template.replace("{name}", name).replace("{link}", link)
}

/// Placeholder names in order of first appearance, without duplicates.
#[must_use]
pub fn template_variables(template: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Minimal projection of a tracking event needed for engagement rollups.
#[derive(Debug, Clone)]
pub struct LinkEventRecord {
    pub event_type: String,
    pub page_url: Option<String>,
    pub product_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkEngagement {
    pub total_opens: i64,
    pub unique_opens: i64,
    pub last_opened: Option<DateTime<Utc>>,
    pub pages_viewed: Vec<String>,
    pub products_viewed: Vec<String>,
    pub items_added_to_cart: i64,
    pub checkout_started: bool,
    pub order_placed: bool,
}

/// Roll a link's raw events up into funnel counters.
///
/// `unique_opens` is 1 when the link was opened at all: a link belongs to a
/// single contact, so every open is attributed to the same person.
#[must_use]
pub fn summarize_link_events(events: &[LinkEventRecord]) -> LinkEngagement {
    let mut summary = LinkEngagement::default();
    let mut pages = BTreeSet::new();
    let mut products = BTreeSet::new();

    for event in events {
        if let Some(product) = event.product_id.as_deref().filter(|p| !p.is_empty()) {
            products.insert(product.to_string());
        }

        match event.event_type.parse::<LinkEventType>() {
            Ok(LinkEventType::LinkOpened) => {
                summary.total_opens += 1;
                if summary.last_opened.is_none_or(|last| event.timestamp > last) {
                    summary.last_opened = Some(event.timestamp);
                }
            }
            Ok(LinkEventType::PageViewed) => {
                if let Some(page) = event.page_url.as_deref().filter(|p| !p.is_empty()) {
                    pages.insert(page.to_string());
                }
            }
            Ok(LinkEventType::ItemAdded) => summary.items_added_to_cart += 1,
            Ok(LinkEventType::CheckoutStarted) => summary.checkout_started = true,
            Ok(LinkEventType::OrderPlaced) => summary.order_placed = true,
            Err(_) => {}
        }
    }

    summary.unique_opens = i64::from(summary.total_opens > 0);
    summary.pages_viewed = pages.into_iter().collect();
    summary.products_viewed = products.into_iter().collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 18, hour, 0, 0).unwrap()
    }

    fn event(kind: &str, page: Option<&str>, product: Option<&str>, hour: u32) -> LinkEventRecord {
        LinkEventRecord {
            event_type: kind.to_string(),
            page_url: page.map(str::to_string),
            product_id: product.map(str::to_string),
            timestamp: at(hour),
        }
    }

    #[test]
    fn tokens_are_32_hex_chars_and_unique() {
        let a = generate_link_token();
        let b = generate_link_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn personalized_url_scheme_depends_on_domain() {
        assert_eq!(
            personalized_url("localhost:3000", "abc"),
            "http://localhost:3000/?ref=abc"
        );
        assert_eq!(
            personalized_url("diwalidelights.in/", "abc"),
            "https://diwalidelights.in/?ref=abc"
        );
    }

    #[test]
    fn default_expiry_is_thirty_days_out() {
        let now = at(9);
        assert_eq!(link_expiry(now, 30), Some(now + Duration::days(30)));
        assert_eq!(link_expiry(now, 0), None);
    }

    #[test]
    fn link_status_checks_flag_then_expiry() {
        let now = at(12);
        assert_eq!(link_status(true, None, now), LinkStatus::Active);
        assert_eq!(link_status(true, Some(at(13)), now), LinkStatus::Active);
        assert_eq!(link_status(true, Some(at(11)), now), LinkStatus::Expired);
        assert_eq!(link_status(false, Some(at(13)), now), LinkStatus::Inactive);
    }

    #[test]
    fn render_message_fills_name_and_link() {
        let out = render_message(
            "Hi {name}! Diwali treats await: {link} ({name})",
            "Priya",
            "https://x/?ref=1",
        );
        assert_eq!(out, "Hi Priya! Diwali treats await: https://x/?ref=1 (Priya)");
    }

    #[test]
    fn template_variables_are_deduplicated_in_order() {
        assert_eq!(
            template_variables("{name}, see {link}. Love, {name} {not valid}"),
            vec!["name".to_string(), "link".to_string()]
        );
    }

    #[test]
    fn summarize_counts_funnel_steps() {
        let events = vec![
            event("link_opened", None, None, 9),
            event("link_opened", None, None, 11),
            event("page_viewed", Some("/sweets"), None, 9),
            event("page_viewed", Some("/sweets"), Some("kaju"), 10),
            event("page_viewed", Some("/namkeen"), None, 10),
            event("item_added", None, Some("kaju"), 10),
            event("checkout_started", None, None, 10),
            event("something_else", None, Some("chakli"), 10),
        ];
        let summary = summarize_link_events(&events);
        assert_eq!(summary.total_opens, 2);
        assert_eq!(summary.unique_opens, 1);
        assert_eq!(summary.last_opened, Some(at(11)));
        assert_eq!(summary.pages_viewed, vec!["/namkeen", "/sweets"]);
        assert_eq!(summary.products_viewed, vec!["chakli", "kaju"]);
        assert_eq!(summary.items_added_to_cart, 1);
        assert!(summary.checkout_started);
        assert!(!summary.order_placed);
    }

    #[test]
    fn summarize_empty_is_zeroed() {
        let summary = summarize_link_events(&[]);
        assert_eq!(summary, LinkEngagement::default());
    }
}
