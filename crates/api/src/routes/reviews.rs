//! Product review endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{ProductId, ReviewId};
use domain::{ProductReviews, ReviewInput, ReviewView};
use store::Store;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, Auth};
use crate::state::AppState;

/// GET /api/products/{id}/reviews: reviews plus rating summary.
#[tracing::instrument(skip(state))]
pub async fn list_for_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ProductReviews>, ApiError> {
    Ok(Json(state.reviews.get_product_reviews(product_id).await?))
}

#[tracing::instrument(skip(state, input))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<(StatusCode, Json<ReviewView>), ApiError> {
    let review = state
        .reviews
        .create_review(caller.user_id, product_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<ReviewId>,
) -> Result<Json<ReviewView>, ApiError> {
    Ok(Json(state.reviews.get_review(id).await?))
}

/// PUT /api/reviews/{id}: author only.
#[tracing::instrument(skip(state, input))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<ReviewId>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<Json<ReviewView>, ApiError> {
    Ok(Json(state.reviews.update_review(caller.user_id, id, input).await?))
}

#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<ReviewId>,
) -> Result<StatusCode, ApiError> {
    state.reviews.delete_review(caller.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
