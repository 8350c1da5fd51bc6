use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::RequestContext,
    config::AppConfig,
    db::with_transaction,
    entities::{order, order_item, User},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::PaymentGateways,
    models::{CartLines, PaymentMethod, ShippingAddress},
    money::validate_price,
    services::cart::{CartOwner, CartService},
};

/// Why checkout cannot go ahead yet, and where the shopper should go to fix it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutBlocker {
    EmptyCart,
    NoShippingAddress,
    NoPaymentMethod,
}

impl CheckoutBlocker {
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptyCart => "Your cart is empty",
            Self::NoShippingAddress => "No shipping address",
            Self::NoPaymentMethod => "No payment method",
        }
    }

    pub fn redirect_to(&self) -> &'static str {
        match self {
            Self::EmptyCart => "/cart",
            Self::NoShippingAddress => "/shipping-address",
            Self::NoPaymentMethod => "/payment-method",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Placed { order_id: Uuid, redirect_to: String },
    Blocked(CheckoutBlocker),
}

/// The order row as checkout is about to write it.
#[derive(Debug, Clone, Validate)]
struct NewOrder {
    user_id: Uuid,
    #[validate]
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    #[validate(custom = "validate_price")]
    items_price: String,
    #[validate(custom = "validate_price")]
    shipping_price: String,
    #[validate(custom = "validate_price")]
    tax_price: String,
    #[validate(custom = "validate_price")]
    total_price: String,
}

/// Turns the caller's cart into an order.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    gateways: PaymentGateways,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        gateways: PaymentGateways,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            config,
            gateways,
            event_sender,
        }
    }

    /// Places an order from the signed-in user's cart.
    ///
    /// Missing cart contents, address or payment method come back as
    /// [`CheckoutOutcome::Blocked`], checked in that order. Otherwise the
    /// order, its items and the cart reset are written in one transaction.
    #[instrument(skip(self, ctx))]
    pub async fn create_order(&self, ctx: &RequestContext) -> Result<CheckoutOutcome, ServiceError> {
        let current = ctx.require_user()?;
        let db = &*self.db;

        let cart = CartService::find_active(db, &CartOwner::User(current.id)).await?;
        let user = User::find_by_id(current.id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let Some(cart) = cart.filter(|cart| !cart.items.is_empty()) else {
            return Ok(CheckoutOutcome::Blocked(CheckoutBlocker::EmptyCart));
        };
        let Some(address) = user.address else {
            return Ok(CheckoutOutcome::Blocked(CheckoutBlocker::NoShippingAddress));
        };
        let Some(payment_method) = user.payment_method else {
            return Ok(CheckoutOutcome::Blocked(CheckoutBlocker::NoPaymentMethod));
        };
        if !self.config.accepts_payment_method(payment_method)
            || !self.gateways.can_settle(payment_method)
        {
            return Err(ServiceError::ValidationError(format!(
                "Invalid payment method: {}",
                payment_method
            )));
        }

        let new_order = NewOrder {
            user_id: user.id,
            shipping_address: address,
            payment_method,
            items_price: cart.items_price.clone(),
            shipping_price: cart.shipping_price.clone(),
            tax_price: cart.tax_price.clone(),
            total_price: cart.total_price.clone(),
        };
        new_order.validate()?;

        let cart_id = cart.id;
        let lines: CartLines = cart.items;
        let line_count = lines.len();

        let order_id = with_transaction(db, move |txn| {
            Box::pin(async move {
                let order_id = Uuid::new_v4();
                order::ActiveModel {
                    id: Set(order_id),
                    user_id: Set(new_order.user_id),
                    shipping_address: Set(new_order.shipping_address),
                    payment_method: Set(new_order.payment_method),
                    items_price: Set(new_order.items_price),
                    shipping_price: Set(new_order.shipping_price),
                    tax_price: Set(new_order.tax_price),
                    total_price: Set(new_order.total_price),
                    is_paid: Set(false),
                    paid_at: Set(None),
                    is_delivered: Set(false),
                    delivered_at: Set(None),
                    payment_result: Set(None),
                    created_at: Set(Utc::now()),
                }
                .insert(txn)
                .await?;

                for line in lines.iter() {
                    order_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        order_id: Set(order_id),
                        product_id: Set(line.product_id),
                        qty: Set(line.qty),
                        price: Set(line.price.clone()),
                        name: Set(line.name.clone()),
                        slug: Set(line.slug.clone()),
                        image: Set(line.image.clone()),
                    }
                    .insert(txn)
                    .await?;
                }

                CartService::clear(txn, cart_id).await?;
                Ok(order_id)
            })
        })
        .await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;
        info!(order_id = %order_id, items = line_count, "Order created");

        Ok(CheckoutOutcome::Placed {
            order_id,
            redirect_to: format!("/order/{}", order_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blockers_point_at_the_page_that_fixes_them() {
        assert_eq!(CheckoutBlocker::EmptyCart.redirect_to(), "/cart");
        assert_eq!(
            CheckoutBlocker::NoShippingAddress.redirect_to(),
            "/shipping-address"
        );
        assert_eq!(
            CheckoutBlocker::NoPaymentMethod.redirect_to(),
            "/payment-method"
        );
        assert_eq!(CheckoutBlocker::EmptyCart.message(), "Your cart is empty");
    }
}
