use sea_orm::{sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    entities::{order, Order, OrderModel},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{CaptureResponse, PaymentGateways},
    models::PaymentResult,
    money::ZERO_PRICE,
    services::orders::{OrderDetails, OrderService},
};

/// Remote order handed to the client-side payment button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: Uuid,
    pub provider_order_id: String,
}

/// Talks to the order's payment provider and settles orders.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateways: PaymentGateways,
    orders: OrderService,
    event_sender: Arc<EventSender>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateways: PaymentGateways,
        orders: OrderService,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            gateways,
            orders,
            event_sender,
        }
    }

    /// Opens a remote order for the order total and remembers the provider's
    /// id as the payment result placeholder.
    #[instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn create_payment_order(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
    ) -> Result<PaymentOrder, ServiceError> {
        ctx.require_user()?;
        let order = self.load(order_id).await?;
        if !ctx.can_access(order.user_id) {
            return Err(ServiceError::Unauthorized(
                "Not allowed to pay for this order".to_string(),
            ));
        }
        if order.is_paid {
            return Err(ServiceError::AlreadyPaid(order_id));
        }

        let gateway = self.gateways.get(order.payment_method)?;
        let remote = gateway.create_order(&order.total_price).await?;

        let placeholder = PaymentResult::placeholder(remote.id.clone());
        Order::update_many()
            .col_expr(order::Column::PaymentResult, Expr::value(placeholder))
            .filter(order::Column::Id.eq(order_id))
            .exec(&*self.db)
            .await?;

        info!(provider_order_id = %remote.id, "Payment order created");
        Ok(PaymentOrder {
            order_id,
            provider_order_id: remote.id,
        })
    }

    /// Captures an approved remote payment and marks the order paid.
    ///
    /// Fails with `PaymentValidationFailed` when the provider returns no body,
    /// a different order id than the stored placeholder, or a status other
    /// than completed.
    #[instrument(skip(self, ctx), fields(order_id = %order_id))]
    pub async fn capture_payment(
        &self,
        ctx: &RequestContext,
        order_id: Uuid,
        provider_order_id: &str,
    ) -> Result<OrderDetails, ServiceError> {
        ctx.require_user()?;
        let order = self.load(order_id).await?;
        if !ctx.can_access(order.user_id) {
            return Err(ServiceError::Unauthorized(
                "Not allowed to pay for this order".to_string(),
            ));
        }

        let gateway = self.gateways.get(order.payment_method)?;
        let capture = gateway.capture_payment(provider_order_id).await?;
        let result = Self::validate_capture(&order, capture).map_err(|e| {
            error!(error = %e, "Rejected payment capture");
            e
        })?;

        let details = self.orders.pay_transition(order_id, Some(result)).await?;
        self.event_sender
            .send_or_log(Event::OrderInvalidated(order_id))
            .await;
        Ok(details)
    }

    /// Checks a capture against the order and builds the receipt to store.
    pub fn validate_capture(
        order: &OrderModel,
        capture: Option<CaptureResponse>,
    ) -> Result<PaymentResult, ServiceError> {
        let capture = capture.ok_or_else(|| {
            ServiceError::PaymentValidationFailed("Provider returned no capture".to_string())
        })?;

        let expected = order.payment_result.as_ref().map(|result| result.id.as_str());
        if expected != Some(capture.id.as_str()) {
            return Err(ServiceError::PaymentValidationFailed(format!(
                "Captured order {} does not match this order's payment",
                capture.id
            )));
        }
        if !capture.is_completed() {
            return Err(ServiceError::PaymentValidationFailed(format!(
                "Capture status is {}",
                capture.status
            )));
        }

        Ok(PaymentResult {
            id: capture.id.clone(),
            status: capture.status.clone(),
            email_address: capture.payer_email().to_string(),
            price_paid: capture
                .captured_amount()
                .unwrap_or(ZERO_PRICE)
                .to_string(),
        })
    }

    async fn load(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))
    }
}
