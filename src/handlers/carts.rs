use axum::{
    extract::{Path, State},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::common::{action, success_response, ActionResult};
use crate::{
    auth::RequestContext,
    errors::ServiceError,
    services::CartOwner,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:product_id", delete(remove_item))
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_qty")]
    pub qty: i32,
}

fn default_qty() -> i32 {
    1
}

async fn get_cart(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, ServiceError> {
    let owner = CartOwner::from_context(&ctx)?;
    let cart = state.services.carts.get_active_cart(&owner).await?;
    Ok(success_response(cart))
}

async fn add_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<AddItemRequest>,
) -> Response {
    let result = state
        .services
        .carts
        .add_item(&ctx, request.product_id, request.qty)
        .await
        .map(|cart| ActionResult::ok("Item added to cart", cart));
    action(result)
}

async fn remove_item(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(product_id): Path<Uuid>,
) -> Response {
    let result = state
        .services
        .carts
        .remove_item(&ctx, product_id)
        .await
        .map(|cart| ActionResult::ok("Item removed from cart", cart));
    action(result)
}
