//! Wishlist endpoints for the calling user.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::ProductId;
use domain::WishlistView;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::extract::{ApiPath, Auth};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub in_wishlist: bool,
}

#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
) -> Result<Json<WishlistView>, ApiError> {
    Ok(Json(state.wishlists.get_wishlist(caller.user_id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<WishlistView>, ApiError> {
    let wishlist = state
        .wishlists
        .add_to_wishlist(caller.user_id, product_id)
        .await?;
    Ok(Json(wishlist))
}

#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<WishlistView>, ApiError> {
    let wishlist = state
        .wishlists
        .remove_from_wishlist(caller.user_id, product_id)
        .await?;
    Ok(Json(wishlist))
}

#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
) -> Result<StatusCode, ApiError> {
    state.wishlists.clear_wishlist(caller.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/wishlist/{productId}/check
pub async fn check<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let in_wishlist = state
        .wishlists
        .is_in_wishlist(caller.user_id, product_id)
        .await?;
    Ok(Json(MembershipResponse { in_wishlist }))
}
