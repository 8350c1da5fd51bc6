use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an unauthenticated shopper is sent.
pub const SIGN_IN_PATH: &str = "/sign-in";

/// JSON body returned for errors that escape a handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A workflow precondition failed; the shopper should go fix it first.
    #[error("{message}")]
    PreconditionNotMet { message: String, redirect_to: String },

    #[error("User is not authenticated")]
    Unauthenticated,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Order {0} is already paid")]
    AlreadyPaid(Uuid),

    #[error("Payment gateway authentication failed: {0}")]
    GatewayAuthFailed(String),

    #[error("Payment gateway request failed: {0}")]
    GatewayRequestFailed(String),

    #[error("Payment validation failed: {0}")]
    PaymentValidationFailed(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn order_not_found(order_id: Uuid) -> Self {
        ServiceError::NotFound(format!("Order {} not found", order_id))
    }

    pub fn precondition(message: impl Into<String>, redirect_to: impl Into<String>) -> Self {
        ServiceError::PreconditionNotMet {
            message: message.into(),
            redirect_to: redirect_to.into(),
        }
    }

    /// Page the caller should navigate to, if the error carries one.
    pub fn redirect_hint(&self) -> Option<&str> {
        match self {
            Self::PreconditionNotMet { redirect_to, .. } => Some(redirect_to),
            Self::Unauthenticated => Some(SIGN_IN_PATH),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::PreconditionNotMet { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::AlreadyPaid(_) => StatusCode::CONFLICT,
            Self::GatewayAuthFailed(_) | Self::GatewayRequestFailed(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentValidationFailed(_) => StatusCode::PAYMENT_REQUIRED,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::ValidationError(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // Navigation, not a failure: the client is sent to sign in.
        if let Self::Unauthenticated = self {
            return Redirect::to(SIGN_IN_PATH).into_response();
        }

        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
