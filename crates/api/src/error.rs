//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable caller identity on the request.
    #[error("Authentication required")]
    Unauthorized,
    /// The caller lacks the role the route requires.
    #[error("Access denied")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    /// Malformed path, query or body.
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    /// Error mapping for cart and checkout writes, where a missing product,
    /// cart line or user means the request can't be honored rather than
    /// that the addressed resource is absent.
    pub(crate) fn rejected(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { .. } | DomainError::UserNotFound(_) => {
                tracing::debug!(error = %err, "request rejected");
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Domain(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::NotFound { .. } | DomainError::UserNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Forbidden => StatusCode::FORBIDDEN,
        DomainError::Store(store_err) => {
            tracing::error!(error = %store_err, "store failure");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
        DomainError::EmptyCart
        | DomainError::InsufficientStock { .. }
        | DomainError::InvalidTransition { .. }
        | DomainError::DuplicateReview
        | DomainError::InvalidRating(_)
        | DomainError::InvalidQuantity
        | DomainError::InvalidPrice
        | DomainError::EmailTaken
        | DomainError::AlreadyInWishlist
        | DomainError::NotInWishlist => StatusCode::BAD_REQUEST,
    };

    tracing::debug!(error = %err, %status, "request rejected");
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use common::OrderStatus;
    use store::StoreError;

    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn business_errors_are_bad_requests() {
        assert_eq!(status_of(DomainError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(DomainError::InvalidTransition {
                from: OrderStatus::Paid,
                to: OrderStatus::Canceled,
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(DomainError::DuplicateReview), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn lookups_and_access() {
        assert_eq!(
            status_of(DomainError::NotFound {
                entity: "Order",
                id: 1,
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(DomainError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn rejected_turns_missing_entities_into_bad_requests() {
        let response = ApiError::rejected(DomainError::NotFound {
            entity: "Product",
            id: 9,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::rejected(DomainError::UserNotFound(common::UserId::new(3)))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Everything else keeps its usual mapping
        let response = ApiError::rejected(DomainError::Forbidden).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response =
            ApiError::rejected(DomainError::Store(StoreError::Corrupt("x".to_string())))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_failures_hide_details() {
        let err = DomainError::Store(StoreError::Corrupt("secret".to_string()));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
