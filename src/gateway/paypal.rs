use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument};

use super::{CaptureResponse, PaymentGateway, RemoteOrder};
use crate::config::PayPalConfig;
use crate::errors::ServiceError;

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// PayPal Orders v2 client.
#[derive(Clone)]
pub struct PayPalClient {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    currency: String,
}

impl PayPalClient {
    pub fn new(config: &PayPalConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            currency: config.currency.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn error_body(response: Response) -> String {
        let status = response.status();
        match response.text().await {
            Ok(body) if !body.trim().is_empty() => body,
            _ => format!("HTTP {}", status),
        }
    }

    fn record(operation: &'static str, started: Instant, ok: bool) {
        histogram!("storefront_gateway.request.duration", started.elapsed(), "operation" => operation);
        if !ok {
            counter!("storefront_gateway.request.error", 1, "operation" => operation);
        }
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    #[instrument(skip(self))]
    async fn get_access_token(&self) -> Result<String, ServiceError> {
        let started = Instant::now();
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ServiceError::GatewayAuthFailed(e.to_string()))?;

        if !response.status().is_success() {
            Self::record("token", started, false);
            let body = Self::error_body(response).await;
            error!(error = %body, "PayPal token request rejected");
            return Err(ServiceError::GatewayAuthFailed(body));
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayAuthFailed(format!("Invalid token response: {}", e)))?;
        Self::record("token", started, true);
        Ok(token.access_token)
    }

    #[instrument(skip(self))]
    async fn create_order(&self, amount: &str) -> Result<RemoteOrder, ServiceError> {
        let token = self.get_access_token().await?;
        let started = Instant::now();
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": self.currency,
                    "value": amount,
                }
            }]
        });

        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            Self::record("create_order", started, false);
            return Err(ServiceError::GatewayRequestFailed(
                Self::error_body(response).await,
            ));
        }

        let order: RemoteOrder = response.json().await.map_err(|e| {
            ServiceError::GatewayRequestFailed(format!("Invalid order response: {}", e))
        })?;
        Self::record("create_order", started, true);
        debug!(remote_order_id = %order.id, status = %order.status, "PayPal order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn capture_payment(
        &self,
        remote_order_id: &str,
    ) -> Result<Option<CaptureResponse>, ServiceError> {
        let token = self.get_access_token().await?;
        let started = Instant::now();
        let response = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{}/capture", remote_order_id)))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::GatewayRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            Self::record("capture", started, false);
            return Err(ServiceError::GatewayRequestFailed(
                Self::error_body(response).await,
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::GatewayRequestFailed(e.to_string()))?;
        Self::record("capture", started, true);

        if text.trim().is_empty() {
            return Ok(None);
        }

        let capture = serde_json::from_str(&text).map_err(|e| {
            ServiceError::GatewayRequestFailed(format!("Invalid capture response: {}", e))
        })?;
        Ok(Some(capture))
    }
}
