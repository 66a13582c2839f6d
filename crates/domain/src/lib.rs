//! Domain layer for the storefront.
//!
//! Each service wraps a [`store::Store`] and owns one area of behavior:
//! - [`CatalogService`]: products, categories, brands
//! - [`CartService`]: the per-user cart, priced live
//! - [`OrderService`]: checkout and the order lifecycle
//! - [`ReviewService`] and [`WishlistService`]
//! - [`UserService`]: registration and profile lookup
//!
//! Cart mutations and checkout for one user are serialized through a shared
//! [`UserLocks`].

pub mod cart;
pub mod catalog;
pub mod error;
pub mod locks;
pub mod order;
pub mod review;
pub mod user;
pub mod wishlist;

pub use cart::{CartLineView, CartService, CartView};
pub use catalog::{CatalogService, ProductInput, ProductUpdate, ProductView};
pub use error::DomainError;
pub use locks::UserLocks;
pub use order::{
    OrderItemView, OrderService, OrderSummary, OrderView, ShippingInfo, StatusPolicy,
    UnknownPolicy,
};
pub use review::{ProductReviews, ReviewInput, ReviewService, ReviewView};
pub use user::{Caller, Registration, UserService, UserView};
pub use wishlist::{WishlistItemView, WishlistService, WishlistView};
