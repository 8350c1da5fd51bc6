use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::services::CheckoutOutcome;

/// Uniform outcome of a storefront action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult<T = serde_json::Value> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ActionResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            redirect_to: None,
            data: Some(data),
        }
    }

    pub fn redirect(mut self, to: impl Into<String>) -> Self {
        self.redirect_to = Some(to.into());
        self
    }

    pub fn failure(message: impl Into<String>, redirect_to: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            redirect_to,
            data: None,
        }
    }
}

impl From<CheckoutOutcome> for ActionResult<()> {
    fn from(outcome: CheckoutOutcome) -> Self {
        match outcome {
            CheckoutOutcome::Placed { redirect_to, .. } => Self {
                success: true,
                message: "Order created".to_string(),
                redirect_to: Some(redirect_to),
                data: None,
            },
            CheckoutOutcome::Blocked(blocker) => Self::failure(
                blocker.message(),
                Some(blocker.redirect_to().to_string()),
            ),
        }
    }
}

/// Renders a service result as an [`ActionResult`].
///
/// Failures keep their HTTP status but carry the uniform body; an
/// unauthenticated caller is redirected to sign in instead.
pub fn action<T: Serialize>(
    result: Result<ActionResult<T>, ServiceError>,
) -> Response {
    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(ServiceError::Unauthenticated) => ServiceError::Unauthenticated.into_response(),
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                tracing::error!(error = %err, "action failed");
            }
            let body: ActionResult<()> = ActionResult::failure(
                err.response_message(),
                err.redirect_hint().map(str::to_string),
            );
            (status, Json(body)).into_response()
        }
    }
}

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Pagination parameters for list operations
#[derive(Debug, Deserialize, Serialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default)]
    pub query: Option<String>,
}

fn default_page() -> u64 {
    1
}
