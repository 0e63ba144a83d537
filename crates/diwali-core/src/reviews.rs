//! Post-purchase review solicitation: request states, rating rules, and the
//! thank-you message with its deep links.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::CoreError;

text_enum! {
    pub enum ReviewStatus("review status") {
        Pending => "pending",
        Sent => "sent",
        Reviewed => "reviewed",
        Expired => "expired",
    }
}

impl ReviewStatus {
    /// Whether moving a request into this status counts as a submitted review.
    #[must_use]
    pub fn is_submitted(self) -> bool {
        self == Self::Reviewed
    }
}

text_enum! {
    /// Channel a review request goes out on.
    pub enum RequestMethod("request method") {
        WhatsApp => "whatsapp",
        Sms => "sms",
        Email => "email",
    }
}

pub const BUSINESS_NAME: &str = "Aparna's Diwali Delights";
pub const BUSINESS_PHONE: &str = "+91 9920632654";
const EMAIL_SUBJECT: &str = "Review Request - Aparna's Diwali Delights";

/// Characters left unescaped in deep-link query values: ASCII alphanumerics
/// plus `-._~/`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Validate a 1–5 rating.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] naming `field` when out of range.
pub fn validate_rating(field: &str, rating: i32) -> Result<(), CoreError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be between 1 and 5, got {rating}"
        )))
    }
}

/// Validate the overall rating and any supplied sub-ratings.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for the first out-of-range rating.
pub fn validate_ratings(
    overall: i32,
    taste: Option<i32>,
    packaging: Option<i32>,
    delivery: Option<i32>,
) -> Result<(), CoreError> {
    validate_rating("overall_rating", overall)?;
    for (field, value) in [
        ("taste_rating", taste),
        ("packaging_rating", packaging),
        ("delivery_rating", delivery),
    ] {
        if let Some(value) = value {
            validate_rating(field, value)?;
        }
    }
    Ok(())
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

/// Percentage of requests that turned into a review, to two decimals.
#[must_use]
pub fn response_rate(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = completed as f64 / total as f64 * 100.0;
    round_to(rate, 2)
}

/// Mean rating to one decimal, or 0 for no ratings.
#[must_use]
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / ratings.len() as f64;
    round_to(mean, 1)
}

/// The thank-you note sent when asking a customer for a review.
#[must_use]
pub fn review_request_message(customer_name: &str, products: &[String]) -> String {
    let products = products.join(", ");
    format!(
        "🌟 Dear {customer_name},\n\
         \n\
         Thank you for your recent order from {BUSINESS_NAME}!\n\
         \n\
         We hope you enjoyed: {products}\n\
         \n\
         We would love to hear your feedback! Your review helps us serve you \
         better and helps other customers make informed choices.\n\
         \n\
         Please rate your experience:\n\
         ⭐ Taste & Quality\n\
         ⭐ Packaging\n\
         ⭐ Delivery Experience\n\
         ⭐ Overall Satisfaction\n\
         \n\
         Share your thoughts with us!\n\
         \n\
         Best regards,\n\
         {BUSINESS_NAME}\n\
         📞 {BUSINESS_PHONE}"
    )
}

/// SMS and email clients render emoji poorly, so the decorations are dropped
/// or swapped for plain asterisks.
fn plain_text(message: &str) -> String {
    message.replace('🌟', "").replace('⭐', "*")
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewLinks {
    pub whatsapp: String,
    pub sms: String,
    pub email: String,
}

/// Deep links that open the customer's messaging app with `message`
/// prefilled.
#[must_use]
pub fn review_links(message: &str, phone: &str, email: Option<&str>) -> ReviewLinks {
    let wa_number: String = phone.chars().filter(char::is_ascii_digit).collect();
    let plain = encode(&plain_text(message));

    ReviewLinks {
        whatsapp: format!("https://wa.me/{wa_number}?text={}", encode(message)),
        sms: format!("sms:{phone}?body={plain}"),
        email: format!(
            "mailto:{}?subject={}&body={plain}",
            email.unwrap_or_default(),
            encode(EMAIL_SUBJECT)
        ),
    }
}
