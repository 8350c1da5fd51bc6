use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::errors::ServiceError;
use crate::models::CartLine;
use crate::money::{format_price, parse_price, ZERO_PRICE};

/// The four money fields carried by carts and orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPrices {
    pub items_price: String,
    pub shipping_price: String,
    pub tax_price: String,
    pub total_price: String,
}

impl CartPrices {
    pub fn zero() -> Self {
        Self {
            items_price: ZERO_PRICE.to_string(),
            shipping_price: ZERO_PRICE.to_string(),
            tax_price: ZERO_PRICE.to_string(),
            total_price: ZERO_PRICE.to_string(),
        }
    }
}

/// Prices a set of cart lines.
///
/// Shipping is free once the items subtotal exceeds the threshold; an empty
/// cart costs nothing at all.
pub fn calc_prices(lines: &[CartLine], rules: &PricingConfig) -> Result<CartPrices, ServiceError> {
    if lines.is_empty() {
        return Ok(CartPrices::zero());
    }

    let mut items = Decimal::ZERO;
    for line in lines {
        let subtotal = parse_price(&line.price)?
            .checked_mul(Decimal::from(line.qty))
            .ok_or_else(amount_overflow)?;
        items = items.checked_add(subtotal).ok_or_else(amount_overflow)?;
    }
    let items = round2(items);

    let shipping = if items > rules.free_shipping_threshold {
        Decimal::ZERO
    } else {
        round2(rules.shipping_fee)
    };
    let tax = round2(items.checked_mul(rules.tax_rate).ok_or_else(amount_overflow)?);
    let total = items
        .checked_add(shipping)
        .and_then(|sum| sum.checked_add(tax))
        .ok_or_else(amount_overflow)?;

    Ok(CartPrices {
        items_price: format_price(items),
        shipping_price: format_price(shipping),
        tax_price: format_price(tax),
        total_price: format_price(total),
    })
}

/// Raised when a money sum no longer fits in a [`Decimal`].
pub fn amount_overflow() -> ServiceError {
    ServiceError::ValidationError("Amount is too large".to_string())
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}
