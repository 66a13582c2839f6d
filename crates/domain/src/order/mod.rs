//! Checkout and the order lifecycle.

mod policy;
mod service;
mod view;

pub use policy::{StatusPolicy, UnknownPolicy};
pub use service::OrderService;
pub use view::{OrderItemView, OrderSummary, OrderView, ShippingInfo};
