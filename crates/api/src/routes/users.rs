//! Account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::{Registration, UserView};
use store::Store;

use crate::error::ApiError;
use crate::extract::{ApiJson, Auth};
use crate::state::AppState;

/// POST /api/users: open registration, always as a client.
#[tracing::instrument(skip(state, registration))]
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    if registration.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }
    let user = state.users.register(registration).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[tracing::instrument(skip(state))]
pub async fn me<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Auth(caller): Auth,
) -> Result<Json<UserView>, ApiError> {
    Ok(Json(state.users.get(caller.user_id).await?))
}
