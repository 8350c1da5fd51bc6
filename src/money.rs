//! Price strings.
//!
//! Every price crossing a boundary (database row, JSON payload, gateway call)
//! is a decimal string with exactly two fraction digits, e.g. `"26.20"`.
//! Arithmetic happens on [`Decimal`] and is formatted back with
//! [`format_price`].

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use validator::ValidationError;

use crate::errors::ServiceError;

static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d{2}$").expect("price pattern compiles"));

pub const ZERO_PRICE: &str = "0.00";

pub fn is_valid_price(value: &str) -> bool {
    PRICE_PATTERN.is_match(value)
}

/// Rounds half away from zero to cents and renders with two fraction digits.
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

pub fn parse_price(value: &str) -> Result<Decimal, ServiceError> {
    if !is_valid_price(value) {
        return Err(ServiceError::ValidationError(format!(
            "Price must have exactly two decimal places: '{}'",
            value
        )));
    }
    Decimal::from_str(value)
        .map_err(|e| ServiceError::ValidationError(format!("Invalid price '{}': {}", value, e)))
}

/// `validator` hook for price fields.
pub fn validate_price(value: &str) -> Result<(), ValidationError> {
    if is_valid_price(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("price_format");
        err.message = Some("Price must have exactly two decimal places.".into());
        Err(err)
    }
}
