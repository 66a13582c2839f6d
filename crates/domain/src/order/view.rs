//! Read models returned by the order service.

use chrono::NaiveDate;
use common::{Money, OrderId, OrderItemId, OrderStatus, OrderUuid, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::{Address, Order, OrderLine};

/// Checkout input. Omitted shipping fields fall back to the user's address.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_zip_code: Option<String>,
    pub notes: Option<String>,
}

impl ShippingInfo {
    pub(crate) fn address(&self) -> Address {
        Address {
            address: self.shipping_address.clone(),
            city: self.shipping_city.clone(),
            state: self.shipping_state.clone(),
            zip_code: self.shipping_zip_code.clone(),
        }
    }
}

/// One frozen order line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub total: Money,
}

impl From<OrderLine> for OrderItemView {
    fn from(line: OrderLine) -> Self {
        Self {
            total: line.total(),
            id: line.id,
            product_id: line.product_id,
            product_name: line.product_name,
            product_image: line.product_image,
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub uuid: OrderUuid,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub total_amount: Money,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_zip_code: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItemView>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            uuid: order.uuid,
            user_id: order.user_id,
            status: order.status,
            order_date: order.order_date,
            delivery_date: order.delivery_date,
            total_amount: order.total_amount,
            shipping_address: order.shipping.address,
            shipping_city: order.shipping.city,
            shipping_state: order.shipping.state,
            shipping_zip_code: order.shipping.zip_code,
            notes: order.notes,
            items: order.lines.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

/// Row of the "my orders" listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub uuid: OrderUuid,
    pub order_date: NaiveDate,
    pub total_amount: Money,
    pub status: OrderStatus,
    /// Number of distinct lines, not units.
    pub item_count: usize,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            uuid: order.uuid,
            order_date: order.order_date,
            total_amount: order.total_amount,
            status: order.status,
            item_count: order.lines.len(),
        }
    }
}
