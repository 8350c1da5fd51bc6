use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::common::{action, created_response, success_response, ActionResult, PaginationParams};
use crate::{
    auth::RequestContext,
    errors::ServiceError,
    services::{accounts::UpdateUserRequest, catalog::ProductRequest},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/summary", get(sales_summary))
        .route("/admin/orders", get(all_orders))
        .route("/admin/orders/:id", delete(delete_order))
        .route("/admin/orders/:id/pay", post(mark_paid))
        .route("/admin/orders/:id/deliver", post(mark_delivered))
        .route("/admin/products", get(all_products).post(create_product))
        .route("/admin/products/:id", put(update_product).delete(delete_product))
        .route("/admin/users", get(all_users))
        .route("/admin/users/:id", put(update_user).delete(delete_user))
}

async fn sales_summary(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, ServiceError> {
    let summary = state.services.orders.sales_summary(&ctx).await?;
    Ok(success_response(summary))
}

async fn all_orders(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = state
        .services
        .orders
        .all_orders(&ctx, params.query.as_deref(), params.page)
        .await?;
    Ok(success_response(page))
}

async fn delete_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Response {
    let result = state
        .services
        .orders
        .delete_order(&ctx, id)
        .await
        .map(|()| ActionResult::ok("Order deleted successfully", ()));
    action(result)
}

async fn mark_paid(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Response {
    let result = state
        .services
        .orders
        .mark_paid_cash_on_delivery(&ctx, id)
        .await
        .map(|order| ActionResult::ok("Order marked as paid", order));
    action(result)
}

async fn mark_delivered(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Response {
    let result = state
        .services
        .orders
        .mark_delivered(&ctx, id)
        .await
        .map(|order| ActionResult::ok("Order marked as delivered", order));
    action(result)
}

async fn create_product(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<ProductRequest>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.create_product(&ctx, request).await?;
    Ok(created_response(product))
}

async fn all_products(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = state
        .services
        .catalog
        .all_products(&ctx, params.query.as_deref(), params.page)
        .await?;
    Ok(success_response(page))
}

async fn update_product(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ProductRequest>,
) -> Response {
    let result = state
        .services
        .catalog
        .update_product(&ctx, id, request)
        .await
        .map(|product| ActionResult::ok("Product updated successfully", product));
    action(result)
}

async fn delete_product(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Response {
    let result = state
        .services
        .catalog
        .delete_product(&ctx, id)
        .await
        .map(|()| ActionResult::ok("Product deleted successfully", ()));
    action(result)
}

async fn all_users(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = state
        .services
        .accounts
        .all_users(&ctx, params.query.as_deref(), params.page)
        .await?;
    Ok(success_response(page))
}

async fn update_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Response {
    let result = state
        .services
        .accounts
        .update_user(&ctx, id, request)
        .await
        .map(|user| ActionResult::ok("User updated successfully", user));
    action(result)
}

async fn delete_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Response {
    let result = state
        .services
        .accounts
        .delete_user(&ctx, id)
        .await
        .map(|()| ActionResult::ok("User deleted successfully", ()));
    action(result)
}
