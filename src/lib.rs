//! Storefront back end
//!
//! Carts, checkout, the order lifecycle and PayPal payment settlement.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod money;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::events::{Event, EventSender};
use crate::gateway::PaymentGateways;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires services over `db`. The returned receiver should be handed to
    /// [`events::process_events`].
    pub fn new(
        db: DatabaseConnection,
        config: AppConfig,
        gateways: PaymentGateways,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (event_sender, event_rx) = events::channel(config.event_channel_capacity);
        let db = Arc::new(db);
        let config = Arc::new(config);
        let event_sender = Arc::new(event_sender);
        let services = handlers::AppServices::new(
            db.clone(),
            config.clone(),
            event_sender.clone(),
            gateways,
        );

        (
            Self {
                db,
                config,
                event_sender,
                services,
            },
            event_rx,
        )
    }
}

/// Builds the full HTTP router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(handlers::auth::router())
        .merge(handlers::carts::router())
        .merge(handlers::catalog::router())
        .merge(handlers::orders::router())
        .merge(handlers::admin::router());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
