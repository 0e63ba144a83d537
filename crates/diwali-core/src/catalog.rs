use rust_decimal::Decimal;

use crate::CoreError;

text_enum! {
    /// Storefront visibility of a product.
    pub enum ProductStatus("product status") {
        Active => "active",
        Inactive => "inactive",
        OutOfStock => "out_of_stock",
    }
}

impl Default for ProductStatus {
    fn default() -> Self {
        Self::Active
    }
}

pub const DEFAULT_UNIT: &str = "per kg";

/// Price a customer actually pays per unit.
///
/// An explicit offer price always wins; otherwise the discount percentage is
/// applied to the base price; otherwise the base price stands.
#[must_use]
pub fn effective_price(
    base_price: Decimal,
    discount_percentage: Option<Decimal>,
    offer_price: Option<Decimal>,
) -> Decimal {
    if let Some(offer) = offer_price {
        return offer;
    }
    if let Some(discount) = discount_percentage {
        return (base_price * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED)
            .round_dp(2);
    }
    base_price
}

#[must_use]
pub fn has_offer(discount_percentage: Option<Decimal>, offer_price: Option<Decimal>) -> bool {
    discount_percentage.is_some() || offer_price.is_some()
}

/// Reject negative prices and discounts outside `0..=100`.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] describing the first offending field.
pub fn validate_pricing(
    base_price: Option<Decimal>,
    discount_percentage: Option<Decimal>,
    offer_price: Option<Decimal>,
) -> Result<(), CoreError> {
    if let Some(base) = base_price {
        if base < Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "base_price must not be negative, got {base}"
            )));
        }
    }
    if let Some(discount) = discount_percentage {
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            return Err(CoreError::Validation(format!(
                "discount_percentage must be between 0 and 100, got {discount}"
            )));
        }
    }
    if let Some(offer) = offer_price {
        if offer < Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "offer_price must not be negative, got {offer}"
            )));
        }
    }
    Ok(())
}
