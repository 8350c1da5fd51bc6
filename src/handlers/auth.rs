use axum::{
    extract::State,
    response::Response,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;

use super::common::{action, ActionResult};
use crate::{
    auth::RequestContext,
    models::ShippingAddress,
    services::accounts::{SignInRequest, SignUpRequest, UpdateProfileRequest},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/user/address", put(update_address))
        .route("/user/payment-method", put(update_payment_method))
        .route("/user/profile", put(update_profile))
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodRequest {
    #[serde(rename = "type")]
    pub method: String,
}

async fn sign_up(State(state): State<AppState>, Json(request): Json<SignUpRequest>) -> Response {
    let result = state
        .services
        .accounts
        .sign_up(request)
        .await
        .map(|user| ActionResult::ok("User signed up successfully.", user));
    action(result)
}

async fn sign_in(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<SignInRequest>,
) -> Response {
    let result = state
        .services
        .accounts
        .sign_in(request, ctx.session_cart_id.as_deref())
        .await
        .map(|signed_in| ActionResult::ok("Signed in successfully.", signed_in));
    action(result)
}

async fn sign_out(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let result = state
        .services
        .accounts
        .sign_out(&ctx)
        .await
        .map(|()| ActionResult::ok("Signed out.", ()).redirect("/"));
    action(result)
}

async fn update_address(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(address): Json<ShippingAddress>,
) -> Response {
    let result = state
        .services
        .accounts
        .update_address(&ctx, address)
        .await
        .map(|user| {
            ActionResult::ok("User updated successfully.", user).redirect("/payment-method")
        });
    action(result)
}

async fn update_payment_method(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<PaymentMethodRequest>,
) -> Response {
    let result = state
        .services
        .accounts
        .update_payment_method(&ctx, &request.method)
        .await
        .map(|user| ActionResult::ok("User updated successfully.", user).redirect("/place-order"));
    action(result)
}

async fn update_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<UpdateProfileRequest>,
) -> Response {
    let result = state
        .services
        .accounts
        .update_profile(&ctx, request)
        .await
        .map(|user| ActionResult::ok("Profile updated successfully.", user));
    action(result)
}
