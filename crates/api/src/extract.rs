//! Request extractors that reject with [`ApiError`] so every failure carries
//! the same `{"message": ...}` body.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use common::UserId;
use domain::Caller;
use serde::de::DeserializeOwned;
use store::Role;

use crate::error::ApiError;

/// Header carrying the authenticated user's id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's role.
pub const ROLE_HEADER: &str = "x-user-role";

fn caller_from(parts: &Parts) -> Result<Option<Caller>, ApiError> {
    let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    let user_id: i64 = raw
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or(ApiError::Unauthorized)?;
    let role = parts
        .headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(Role::parse)
        .unwrap_or_default();

    Ok(Some(Caller {
        user_id: UserId::new(user_id),
        role,
    }))
}

/// An authenticated caller. Rejects with 401 when the identity is missing.
#[derive(Debug, Clone, Copy)]
pub struct Auth(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from(parts)?.map(Auth).ok_or(ApiError::Unauthorized)
    }
}

/// An authenticated admin. Rejects with 401 without identity, 403 without the role.
#[derive(Debug, Clone, Copy)]
pub struct Admin(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = caller_from(parts)?.ok_or(ApiError::Unauthorized)?;
        if !caller.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(Admin(caller))
    }
}

/// The caller if the request carries an identity. Never rejects for a missing one.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuth(pub Option<Caller>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(caller_from(parts)?))
    }
}

/// `Path` with a JSON error body.
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(ApiPath(value))
    }
}

/// `Query` with a JSON error body.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(ApiQuery(value))
    }
}

/// `Json` with a JSON error body.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(ApiJson(value))
    }
}
