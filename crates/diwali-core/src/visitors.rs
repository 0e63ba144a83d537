text_enum! {
    pub enum VisitorType("visitor type") {
        Anonymous => "anonymous",
        Identified => "identified",
        Customer => "customer",
    }
}

impl Default for VisitorType {
    fn default() -> Self {
        Self::Anonymous
    }
}

text_enum! {
    /// Where in the purchase flow a cart was left behind.
    pub enum AbandonmentStage("abandonment stage") {
        Cart => "cart",
        Checkout => "checkout",
        Payment => "payment",
    }
}

/// Session counter bumped by a visitor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCounter {
    PageViews,
    CartAdditions,
    CheckoutAttempts,
    /// Also adds the cart value to the session total and marks it converted.
    OrdersPlaced,
}

/// Counter touched by `event_type`, or `None` for event types that are
/// recorded without affecting the session.
#[must_use]
pub fn counter_for_event(event_type: &str) -> Option<SessionCounter> {
    match event_type {
        "page_view" => Some(SessionCounter::PageViews),
        "cart_add" => Some(SessionCounter::CartAdditions),
        "checkout_start" => Some(SessionCounter::CheckoutAttempts),
        "order_complete" => Some(SessionCounter::OrdersPlaced),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_events_map_to_counters() {
        assert_eq!(counter_for_event("page_view"), Some(SessionCounter::PageViews));
        assert_eq!(counter_for_event("cart_add"), Some(SessionCounter::CartAdditions));
        assert_eq!(
            counter_for_event("checkout_start"),
            Some(SessionCounter::CheckoutAttempts)
        );
        assert_eq!(
            counter_for_event("order_complete"),
            Some(SessionCounter::OrdersPlaced)
        );
    }

    #[test]
    fn unknown_events_touch_nothing() {
        assert_eq!(counter_for_event("scroll"), None);
        assert_eq!(counter_for_event("PAGE_VIEW"), None);
    }

    #[test]
    fn visitor_type_defaults_to_anonymous() {
        assert_eq!(VisitorType::default(), VisitorType::Anonymous);
        assert_eq!("customer".parse::<VisitorType>().unwrap(), VisitorType::Customer);
    }
}
