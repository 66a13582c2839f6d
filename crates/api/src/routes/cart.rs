//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{CartItemId, ProductId};
use domain::CartView;
use serde::Deserialize;
use store::Store;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, Auth};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// GET /api/cart: the caller's cart, or an empty view.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.get_cart(caller.user_id).await?))
}

/// POST /api/cart/items: add units of a product.
#[tracing::instrument(skip(state))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = state
        .carts
        .add_item(caller.user_id, req.product_id, req.quantity)
        .await
        .map_err(ApiError::rejected)?;
    Ok(Json(cart))
}

/// PUT /api/cart/items/{itemId}: set a line's quantity; zero removes it.
#[tracing::instrument(skip(state))]
pub async fn update_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(item_id): ApiPath<CartItemId>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = state
        .carts
        .update_item_quantity(caller.user_id, item_id, req.quantity)
        .await
        .map_err(ApiError::rejected)?;
    Ok(Json(cart))
}

/// DELETE /api/cart/items/{itemId}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(item_id): ApiPath<CartItemId>,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.remove_item(caller.user_id, item_id).await?))
}

/// DELETE /api/cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
) -> Result<StatusCode, ApiError> {
    state.carts.clear_cart(caller.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
