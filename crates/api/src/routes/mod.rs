//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
pub mod wishlist;
