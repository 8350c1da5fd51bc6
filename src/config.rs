use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError};

use crate::models::PaymentMethod;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYPAL_URL: &str = "https://api-m.sandbox.paypal.com";
const DEFAULT_PAYPAL_CURRENCY: &str = "PHP";
const DEFAULT_PAYMENT_METHODS: &str = "PayPal,Stripe,CashOnDelivery";
const DEFAULT_PAYMENT_METHOD: &str = "PayPal";

/// PayPal REST credentials and endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayPalConfig {
    /// Base URL of the REST API (sandbox or live)
    #[serde(default = "default_paypal_url")]
    pub base_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// ISO 4217 currency used for every purchase unit
    #[serde(default = "default_paypal_currency")]
    pub currency: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_paypal_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            base_url: default_paypal_url(),
            client_id: String::new(),
            client_secret: String::new(),
            currency: default_paypal_currency(),
            timeout_secs: default_paypal_timeout_secs(),
        }
    }
}

/// Cart pricing rules.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Tax rate applied to the items subtotal (0.15 = 15%)
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// Orders whose items subtotal exceeds this ship for free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat shipping fee below the threshold
    #[serde(default = "default_shipping_fee")]
    pub shipping_fee: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            free_shipping_threshold: default_free_shipping_threshold(),
            shipping_fee: default_shipping_fee(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 32 characters)
    #[validate(length(min = 32, message = "jwt_secret must be at least 32 characters"))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Comma-separated list of accepted payment methods
    #[serde(default = "default_payment_methods")]
    #[validate(custom = "validate_payment_methods")]
    pub payment_methods: String,

    /// Payment method preselected for new shoppers
    #[serde(default = "default_payment_method")]
    pub default_payment_method: String,

    /// Page size for order listings
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub page_size: u64,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default)]
    pub paypal: PayPalConfig,

    #[serde(default)]
    pub pricing: PricingConfig,
}

impl AppConfig {
    /// Builds a configuration with defaults for everything but the essentials.
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration: 30 * 24 * 60 * 60,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            payment_methods: default_payment_methods(),
            default_payment_method: default_payment_method(),
            page_size: default_page_size(),
            event_channel_capacity: default_event_channel_capacity(),
            paypal: PayPalConfig::default(),
            pricing: PricingConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Payment methods shoppers may choose, in configured order.
    /// Unknown names are skipped.
    pub fn accepted_payment_methods(&self) -> Vec<PaymentMethod> {
        self.payment_methods
            .split(',')
            .filter_map(|name| name.trim().parse().ok())
            .collect()
    }

    pub fn accepts_payment_method(&self, method: PaymentMethod) -> bool {
        self.accepted_payment_methods().contains(&method)
    }
}

/// Load configuration from files and environment variables
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("jwt_expiration", 30 * 24 * 60 * 60)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    if app_config.paypal.client_id.is_empty() || app_config.paypal.client_secret.is_empty() {
        warn!("PayPal credentials are not configured; PayPal checkout will fail");
    }

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_payment_methods() -> String {
    DEFAULT_PAYMENT_METHODS.to_string()
}

fn default_payment_method() -> String {
    DEFAULT_PAYMENT_METHOD.to_string()
}

fn default_page_size() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_paypal_url() -> String {
    DEFAULT_PAYPAL_URL.to_string()
}

fn default_paypal_currency() -> String {
    DEFAULT_PAYPAL_CURRENCY.to_string()
}

fn default_paypal_timeout_secs() -> u64 {
    15
}

fn default_tax_rate() -> Decimal {
    dec!(0.15)
}

fn default_free_shipping_threshold() -> Decimal {
    dec!(100)
}

fn default_shipping_fee() -> Decimal {
    dec!(10)
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}

fn validate_payment_methods(methods: &str) -> Result<(), ValidationError> {
    let mut any = false;
    for name in methods.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if name.parse::<PaymentMethod>().is_err() {
            return Err(ValidationError::new("unknown_payment_method"));
        }
        any = true;
    }
    if any {
        Ok(())
    } else {
        Err(ValidationError::new("no_payment_methods"))
    }
}
