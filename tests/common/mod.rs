#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    auth::{issue_token, RequestContext, SESSION_CART_HEADER},
    config::AppConfig,
    db::{self, DbConfig},
    entities::{cart, product, user, Product, ProductModel, UserModel},
    errors::ServiceError,
    events::Event,
    gateway::{CaptureResponse, PaymentGateway, PaymentGateways, RemoteOrder},
    models::{CartLine, CartLines, ImageList, PaymentMethod, Role, ShippingAddress},
    services::pricing::calc_prices,
    AppState,
};

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Scripted payment provider.
#[derive(Default)]
pub struct FakeGateway {
    pub remote_order_id: Mutex<String>,
    pub capture: Mutex<Option<CaptureResponse>>,
    pub captures_seen: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new(remote_order_id: &str) -> Arc<Self> {
        Arc::new(Self {
            remote_order_id: Mutex::new(remote_order_id.to_string()),
            ..Default::default()
        })
    }

    pub fn respond_with(&self, capture: Option<CaptureResponse>) {
        *self.capture.lock().unwrap() = capture;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn get_access_token(&self) -> Result<String, ServiceError> {
        Ok("fake-token".to_string())
    }

    async fn create_order(&self, _amount: &str) -> Result<RemoteOrder, ServiceError> {
        Ok(RemoteOrder {
            id: self.remote_order_id.lock().unwrap().clone(),
            status: "CREATED".to_string(),
        })
    }

    async fn capture_payment(
        &self,
        remote_order_id: &str,
    ) -> Result<Option<CaptureResponse>, ServiceError> {
        self.captures_seen
            .lock()
            .unwrap()
            .push(remote_order_id.to_string());
        Ok(self.capture.lock().unwrap().clone())
    }
}

pub fn capture(id: &str, status: &str, amount: &str) -> CaptureResponse {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "status": status,
        "payer": { "email_address": "buyer@example.com" },
        "purchase_units": [{ "payments": { "captures": [{ "amount": { "value": amount } }] } }]
    }))
    .unwrap()
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        TEST_SECRET.to_string(),
        "test".to_string(),
    );
    cfg.pricing.tax_rate = dec!(0.06);
    cfg.pricing.shipping_fee = dec!(5);
    cfg.pricing.free_shipping_threshold = dec!(100);
    cfg.page_size = 2;
    cfg
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Juan Dela Cruz".into(),
        street_address: "123 Mabini Street".into(),
        city: "Manila".into(),
        postal_code: "1000".into(),
        country: "Philippines".into(),
        lat: None,
        lng: None,
    }
}

/// Application state over a fresh in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    router: Router,
    events: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let gateway = FakeGateway::new("PAY1");
        let gateways = PaymentGateways::new().with(PaymentMethod::PayPal, gateway.clone());
        let (state, events) = AppState::new(pool, cfg, gateways);
        let router = storefront_api::build_router(state.clone());

        Self {
            state,
            gateway,
            router,
            events,
        }
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    pub async fn seed_user(
        &self,
        name: &str,
        role: Role,
        address: Option<ShippingAddress>,
        payment_method: Option<PaymentMethod>,
    ) -> UserModel {
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(format!("{}@example.com", Uuid::new_v4().simple())),
            password_hash: Set(None),
            role: Set(role),
            address: Set(address),
            payment_method: Set(payment_method),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed user")
    }

    /// A user ready to check out with PayPal.
    pub async fn seed_shopper(&self) -> UserModel {
        self.seed_user(
            "Juan Dela Cruz",
            Role::User,
            Some(address()),
            Some(PaymentMethod::PayPal),
        )
        .await
    }

    pub async fn seed_product(&self, price: &str, stock: i32) -> ProductModel {
        let slug = format!("product-{}", Uuid::new_v4().simple());
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Product {}", &slug[8..14])),
            slug: Set(slug),
            category: Set("Shirts".to_string()),
            brand: Set("Polo".to_string()),
            description: Set("A shirt".to_string()),
            stock: Set(stock),
            price: Set(price.to_string()),
            images: Set(ImageList(vec!["/images/p1.jpg".to_string()])),
            is_featured: Set(false),
            banner: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed product")
    }

    /// Writes a user cart directly, bypassing stock checks.
    pub async fn seed_cart(&self, user_id: Uuid, lines: &[(&ProductModel, i32)]) -> Uuid {
        let lines: Vec<CartLine> = lines
            .iter()
            .map(|(product, qty)| CartLine {
                product_id: product.id,
                name: product.name.clone(),
                slug: product.slug.clone(),
                qty: *qty,
                image: product.images.primary().unwrap_or_default().to_string(),
                price: product.price.clone(),
            })
            .collect();
        let prices = calc_prices(&lines, &self.state.config.pricing).expect("price cart");
        let now = Utc::now();
        let id = Uuid::new_v4();
        cart::ActiveModel {
            id: Set(id),
            session_cart_id: Set(Uuid::new_v4().to_string()),
            user_id: Set(Some(user_id)),
            items: Set(CartLines(lines)),
            items_price: Set(prices.items_price),
            shipping_price: Set(prices.shipping_price),
            tax_price: Set(prices.tax_price),
            total_price: Set(prices.total_price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed cart");
        id
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        Product::find_by_id(product_id)
            .one(self.db())
            .await
            .unwrap()
            .expect("product exists")
            .stock
    }

    pub fn ctx(user: &UserModel) -> RequestContext {
        RequestContext::for_user(user.id, user.role)
    }

    pub fn token_for(&self, user: &UserModel) -> String {
        issue_token(
            TEST_SECRET,
            3600,
            user.id,
            &user.name,
            &user.email,
            user.role,
        )
        .expect("issue token")
    }

    /// Events emitted so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        session: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(session) = session {
            builder = builder.header(SESSION_CART_HEADER, session);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, location, json)
    }
}
