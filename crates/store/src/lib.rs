//! Persistence for the storefront.
//!
//! The [`Store`] trait is the single port the domain talks to. Two
//! implementations are provided: [`InMemoryStore`] for tests and local runs,
//! and [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Address, Brand, Cart, CartLine, Category, NewOrder, NewOrderLine, NewProduct, NewReview,
    NewUser, Order, OrderLine, Product, ProductFilter, ProductPatch, Review, ReviewPatch, Role,
    User, Wishlist, WishlistEntry,
};
pub use postgres::PostgresStore;
pub use store::{Store, StoreExt};
