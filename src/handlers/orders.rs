use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::common::{action, success_response, ActionResult, PaginationParams};
use crate::{auth::RequestContext, errors::ServiceError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/mine", get(my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/payment", post(create_payment_order))
        .route("/orders/:id/capture", post(capture_payment))
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    /// Provider order id the client-side checkout approved.
    #[serde(alias = "orderID")]
    pub provider_order_id: String,
}

async fn create_order(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let result = state
        .services
        .checkout
        .create_order(&ctx)
        .await
        .map(ActionResult::from);
    action(result)
}

async fn get_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get_order(&ctx, id).await?;
    Ok(success_response(order))
}

async fn my_orders(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = state.services.orders.my_orders(&ctx, params.page).await?;
    Ok(success_response(page))
}

async fn create_payment_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Response {
    let result = state
        .services
        .payments
        .create_payment_order(&ctx, id)
        .await
        .map(|payment| ActionResult::ok("Item order created successfully", payment));
    action(result)
}

async fn capture_payment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CaptureRequest>,
) -> Response {
    let result = state
        .services
        .payments
        .capture_payment(&ctx, id, &request.provider_order_id)
        .await
        .map(|order| ActionResult::ok("Order has been paid.", order));
    action(result)
}
