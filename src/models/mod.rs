//! Value types embedded in entity rows (JSON columns and string enums).

use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::money::validate_price;

/// Shipping address, stored on the user profile and snapshotted onto orders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 3, message = "Name should be at least 3 characters long."))]
    pub full_name: String,
    #[validate(length(
        min = 10,
        message = "Shipping address should be at least 10 characters long."
    ))]
    pub street_address: String,
    #[validate(length(min = 3, message = "City should be at least 3 characters long."))]
    pub city: String,
    #[validate(length(min = 3, message = "Postal code should be at least 3 characters long."))]
    pub postal_code: String,
    #[validate(length(min = 3, message = "Country should be at least 3 characters long."))]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// One product line in a cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CartLine {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "Name is required."))]
    pub name: String,
    #[validate(length(min = 1, message = "Slug is required."))]
    pub slug: String,
    #[validate(range(min = 0, message = "Quantity must be a positive number."))]
    pub qty: i32,
    #[validate(length(min = 1, message = "Image is required."))]
    pub image: String,
    #[validate(custom = "validate_price")]
    pub price: String,
}

/// Ordered cart lines, persisted as a single JSON column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct CartLines(pub Vec<CartLine>);

impl CartLines {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CartLine> {
        self.0.iter()
    }

    pub fn find_mut(&mut self, product_id: Uuid) -> Option<&mut CartLine> {
        self.0.iter_mut().find(|line| line.product_id == product_id)
    }
}

/// Product image URLs, first one is the primary image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct ImageList(pub Vec<String>);

impl ImageList {
    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

/// Settlement receipt attached to an order.
///
/// Written twice: as a placeholder holding only the provider order id when the
/// remote order is created, and with the captured values once payment settles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    pub email_address: String,
    pub price_paid: String,
}

impl PaymentResult {
    pub fn placeholder(provider_order_id: impl Into<String>) -> Self {
        Self {
            id: provider_order_id.into(),
            status: String::new(),
            email_address: String::new(),
            price_paid: "0.00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "PayPal")]
    PayPal,
    #[sea_orm(string_value = "Stripe")]
    Stripe,
    #[sea_orm(string_value = "CashOnDelivery")]
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayPal => "PayPal",
            Self::Stripe => "Stripe",
            Self::CashOnDelivery => "CashOnDelivery",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPaymentMethod(pub String);

impl fmt::Display for UnknownPaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown payment method '{}'", self.0)
    }
}

impl std::error::Error for UnknownPaymentMethod {}

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paypal" => Ok(Self::PayPal),
            "stripe" => Ok(Self::Stripe),
            "cashondelivery" | "cash_on_delivery" | "cod" => Ok(Self::CashOnDelivery),
            _ => Err(UnknownPaymentMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "admin")]
    Admin,
}
