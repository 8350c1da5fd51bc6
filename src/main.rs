use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing::{error, info, warn};

use storefront_api as api;
use storefront_api::gateway::{PayPalClient, PaymentGateways};
use storefront_api::models::PaymentMethod;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    // Payment providers, one per accepted method that has an adapter
    let mut gateways = PaymentGateways::new();
    for method in cfg.accepted_payment_methods() {
        match method {
            PaymentMethod::PayPal => {
                gateways.register(method, Arc::new(PayPalClient::new(&cfg.paypal)?));
            }
            PaymentMethod::Stripe => warn!("Stripe is accepted but has no gateway adapter"),
            PaymentMethod::CashOnDelivery => {}
        }
    }

    let addr = SocketAddr::new(cfg.host.parse()?, cfg.port);
    let (app_state, event_rx) = api::AppState::new(db_pool, cfg, gateways);
    tokio::spawn(api::events::process_events(event_rx));

    let app = api::build_router(app_state);

    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => error!("failed to install signal handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
