use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};

use super::common::success_response;
use crate::{errors::ServiceError, services::catalog::LATEST_PRODUCTS_LIMIT, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/latest", get(latest_products))
        .route("/products/:slug", get(get_product))
}

async fn latest_products(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let products = state
        .services
        .catalog
        .latest_products(LATEST_PRODUCTS_LIMIT)
        .await?;
    Ok(success_response(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.get_product_by_slug(&slug).await?;
    Ok(success_response(product))
}
