use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateways;
use crate::services::{
    AccountService, CartService, CatalogService, CheckoutService, OrderService, PaymentService,
};

pub mod admin;
pub mod auth;
pub mod carts;
pub mod catalog;
pub mod common;
pub mod orders;

/// Service container shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub carts: Arc<CartService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        gateways: PaymentGateways,
    ) -> Self {
        let carts = CartService::new(
            db_pool.clone(),
            config.pricing.clone(),
            event_sender.clone(),
        );
        let orders = OrderService::new(db_pool.clone(), event_sender.clone(), config.page_size);

        Self {
            accounts: Arc::new(AccountService::new(
                db_pool.clone(),
                carts.clone(),
                config.clone(),
                gateways.clone(),
            )),
            catalog: Arc::new(CatalogService::new(db_pool.clone(), config.page_size)),
            checkout: Arc::new(CheckoutService::new(
                db_pool.clone(),
                config,
                gateways.clone(),
                event_sender.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                db_pool,
                gateways,
                orders.clone(),
                event_sender,
            )),
            carts: Arc::new(carts),
            orders: Arc::new(orders),
        }
    }
}
