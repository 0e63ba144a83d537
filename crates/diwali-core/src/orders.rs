use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

text_enum! {
    /// Kitchen-side progress of an order.
    pub enum OrderStatus("order status") {
        Pending => "pending",
        Confirmed => "confirmed",
        Preparing => "preparing",
        Ready => "ready",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum DeliveryStatus("delivery status") {
        Pending => "pending",
        Dispatched => "dispatched",
        OutForDelivery => "out_for_delivery",
        Delivered => "delivered",
        Failed => "failed",
    }
}

text_enum! {
    pub enum PaymentStatus("payment status") {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Refunded => "refunded",
    }
}

/// One line of an order or an abandoned cart. Stored inside a `JSONB` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    /// Unit price at the time the item was added.
    pub price: Decimal,
    pub quantity: i32,
    pub unit: String,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// What the customer is charged: goods plus delivery.
#[must_use]
pub fn final_amount(total_amount: Decimal, delivery_cost: Decimal) -> Decimal {
    total_amount + delivery_cost
}

#[must_use]
pub fn items_subtotal(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

#[must_use]
pub fn product_names(items: &[OrderItem]) -> Vec<String> {
    items.iter().map(|i| i.product_name.clone()).collect()
}

/// Checks line items for an incoming order or cart snapshot.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] when the list is empty, a quantity is
/// below one, or a price is negative.
pub fn validate_items(items: &[OrderItem]) -> Result<(), CoreError> {
    if items.is_empty() {
        return Err(CoreError::Validation(
            "at least one item is required".to_string(),
        ));
    }
    for item in items {
        if item.product_name.trim().is_empty() {
            return Err(CoreError::Validation(
                "every item needs a product_name".to_string(),
            ));
        }
        if item.quantity < 1 {
            return Err(CoreError::Validation(format!(
                "quantity for '{}' must be at least 1, got {}",
                item.product_name, item.quantity
            )));
        }
        if item.price < Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "price for '{}' must not be negative",
                item.product_name
            )));
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns [`CoreError::Validation`] if `value` is negative.
pub fn validate_amount(field: &str, value: Decimal) -> Result<(), CoreError> {
    if value < Decimal::ZERO {
        return Err(CoreError::Validation(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(name: &str, price: &str, quantity: i32) -> OrderItem {
        OrderItem {
            product_id: format!("p-{name}"),
            product_name: name.to_string(),
            price: dec(price),
            quantity,
            unit: "per kg".to_string(),
        }
    }

    #[test]
    fn final_amount_adds_delivery() {
        assert_eq!(final_amount(dec("1700"), dec("50")), dec("1750"));
        assert_eq!(final_amount(dec("320.00"), dec("0")), dec("320"));
    }

    #[test]
    fn subtotal_multiplies_quantities() {
        let items = vec![item("Special Diwali Mix", "450", 2), item("Kaju Katli", "800", 1)];
        assert_eq!(items_subtotal(&items), dec("1700"));
        assert_eq!(
            product_names(&items),
            vec!["Special Diwali Mix".to_string(), "Kaju Katli".to_string()]
        );
    }

    #[test]
    fn validate_items_rejects_bad_lines() {
        assert!(validate_items(&[]).is_err());
        assert!(validate_items(&[item("Chakli", "200", 0)]).is_err());
        assert!(validate_items(&[item("Chakli", "-1", 1)]).is_err());
        assert!(validate_items(&[item(" ", "10", 1)]).is_err());
        assert!(validate_items(&[item("Chakli", "200", 3)]).is_ok());
    }

    #[test]
    fn validate_amount_allows_zero() {
        assert!(validate_amount("delivery_cost", Decimal::ZERO).is_ok());
        assert!(validate_amount("delivery_cost", dec("-5")).is_err());
    }

    #[test]
    fn status_enums_parse_their_wire_names() {
        assert_eq!(
            DeliveryStatus::from_str("out_for_delivery").unwrap(),
            DeliveryStatus::OutForDelivery
        );
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
        assert!(PaymentStatus::from_str("unpaid").is_err());
    }

    #[test]
    fn order_item_json_shape() {
        let json = serde_json::to_value(item("Kaju Katli", "800", 1)).unwrap();
        assert_eq!(json["product_name"], "Kaju Katli");
        assert_eq!(json["price"], "800");
        assert_eq!(json["quantity"], 1);
    }
}
