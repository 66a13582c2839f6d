//! Domain error types.

use common::{OrderStatus, ProductId, UserId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Every variant except [`DomainError::Store`] is an expected, user-facing
/// outcome and carries enough context to render a message.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The referenced entity doesn't exist (or isn't visible to the caller).
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The acting user has no account.
    #[error("User not found")]
    UserNotFound(UserId),

    /// The caller neither owns the resource nor holds admin privilege.
    #[error("Access denied")]
    Forbidden,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("You have already reviewed this product")]
    DuplicateReview,

    #[error("Rating must be between 1 and 5")]
    InvalidRating(i64),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Price cannot be negative")]
    InvalidPrice,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Product already in wishlist")]
    AlreadyInWishlist,

    #[error("Product not in wishlist")]
    NotInWishlist,

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            other => DomainError::Store(other),
        }
    }
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        DomainError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns true for expected business outcomes, false for infrastructure failures.
    pub fn is_business(&self) -> bool {
        !matches!(self, DomainError::Store(_))
    }
}
