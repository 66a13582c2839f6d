//! Shared types for the storefront crates.

mod money;
mod status;
mod types;

pub use money::Money;
pub use status::{OrderStatus, UnknownStatus};
pub use types::{
    BrandId, CartId, CartItemId, CategoryId, OrderId, OrderItemId, OrderUuid, ProductId, ReviewId,
    UserId, WishlistId, WishlistItemId,
};
