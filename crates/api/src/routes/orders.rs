//! Checkout and order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{OrderId, OrderStatus, OrderUuid};
use domain::{OrderSummary, OrderView, ShippingInfo};
use serde::Deserialize;
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{Admin, ApiJson, ApiPath, Auth};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// POST /api/orders: check out the caller's cart.
#[tracing::instrument(skip(state, shipping))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiJson(shipping): ApiJson<ShippingInfo>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let order = state
        .orders
        .create_order(caller.user_id, shipping)
        .await
        .map_err(ApiError::rejected)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders: the caller's order summaries, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    Ok(Json(state.orders.list_orders(caller.user_id).await?))
}

/// GET /api/orders/{id}: owner or admin only.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.orders.get_order_for(&caller, id).await?))
}

/// GET /api/orders/uuid/{uuid}: public lookup by share link.
#[tracing::instrument(skip(state))]
pub async fn get_by_uuid<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(uuid): ApiPath<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    let order = state
        .orders
        .get_order_by_uuid(OrderUuid::from_uuid(uuid))
        .await?;
    Ok(Json(order))
}

/// PUT /api/orders/{id}/status: admin status overwrite.
#[tracing::instrument(skip(state))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.orders.update_status(id, req.status).await?))
}

/// POST /api/orders/{id}/cancel: cancel the caller's own order.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<StatusCode, ApiError> {
    if state.orders.cancel_order(caller.user_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Order not found".to_string()))
    }
}
