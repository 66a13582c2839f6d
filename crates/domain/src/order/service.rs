//! Checkout and order lifecycle.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{Money, OrderId, OrderStatus, OrderUuid, ProductId, UserId};
use store::{NewOrder, NewOrderLine, Order, Product, Store, StoreError};

use super::{OrderSummary, OrderView, ShippingInfo, StatusPolicy};
use crate::{Caller, DomainError, UserLocks};

/// Counts a rejected checkout and passes the error through.
fn rejected(reason: &'static str, err: DomainError) -> DomainError {
    metrics::counter!("checkout_rejected_total", "reason" => reason).increment(1);
    tracing::debug!(reason, error = %err, "checkout rejected");
    err
}

/// Service for turning carts into orders and moving orders through their lifecycle.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    locks: UserLocks,
    policy: StatusPolicy,
}

impl<S: Store> OrderService<S> {
    /// Creates an order service. `locks` must be shared with the cart service.
    pub fn new(store: S, locks: UserLocks) -> Self {
        Self {
            store,
            locks,
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Converts the user's cart into an order.
    ///
    /// Prices are read live and frozen on the order lines. Stock is
    /// decremented, the order written and the cart emptied in one unit of
    /// work; a line that would take stock below zero rejects the whole
    /// checkout and leaves nothing behind.
    #[tracing::instrument(skip(self, shipping))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        shipping: ShippingInfo,
    ) -> Result<OrderView, DomainError> {
        let started = Instant::now();
        let _guard = self.locks.lock(user_id).await;

        let cart = match self.store.get_cart(user_id).await? {
            Some(cart) if !cart.lines.is_empty() => cart,
            _ => return Err(rejected("empty_cart", DomainError::EmptyCart)),
        };

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| rejected("unknown_user", DomainError::UserNotFound(user_id)))?;

        let mut products: HashMap<ProductId, Product> = HashMap::with_capacity(cart.lines.len());
        let mut lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = self
                .store
                .get_product(line.product_id)
                .await?
                .filter(|p| p.active)
                .ok_or_else(|| {
                    rejected(
                        "product_unavailable",
                        DomainError::not_found("Product", line.product_id),
                    )
                })?;

            if product.stock_quantity < line.quantity {
                return Err(rejected(
                    "insufficient_stock",
                    DomainError::InsufficientStock {
                        product_id: product.id,
                        product_name: product.name,
                        requested: line.quantity,
                        available: product.stock_quantity,
                    },
                ));
            }

            lines.push(NewOrderLine {
                product_id: product.id,
                unit_price: product.price,
                quantity: line.quantity,
            });
            products.insert(product.id, product);
        }

        let total_amount: Money = lines.iter().map(|l| l.unit_price.multiply(l.quantity)).sum();
        let new_order = NewOrder {
            uuid: OrderUuid::new(),
            user_id,
            cart_id: cart.id,
            order_date: Utc::now().date_naive(),
            total_amount,
            shipping: shipping.address().or(&user.address),
            notes: shipping.notes,
            lines,
        };

        let order = match self.store.place_order(new_order).await {
            Ok(order) => order,
            // Stock moved between the check above and the conditional decrement
            Err(StoreError::InsufficientStock {
                product_id,
                requested,
            }) => {
                let available = self
                    .store
                    .get_product(product_id)
                    .await?
                    .map(|p| p.stock_quantity)
                    .unwrap_or(0);
                let product_name = products
                    .remove(&product_id)
                    .map(|p| p.name)
                    .unwrap_or_default();
                return Err(rejected(
                    "insufficient_stock",
                    DomainError::InsufficientStock {
                        product_id,
                        product_name,
                        requested,
                        available,
                    },
                ));
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id,
            uuid = %order.uuid,
            total = %order.total_amount,
            lines = order.lines.len(),
            "order placed"
        );

        Ok(order.into())
    }

    /// Lists the user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderSummary>, DomainError> {
        let orders = self.store.list_orders_for_user(user_id).await?;
        Ok(orders.iter().map(OrderSummary::from).collect())
    }

    /// Loads an order the caller owns. Admins can load any order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_for(
        &self,
        caller: &Caller,
        id: OrderId,
    ) -> Result<OrderView, DomainError> {
        let order = self.load(id).await?;
        if order.user_id != Some(caller.user_id) && !caller.is_admin() {
            return Err(DomainError::Forbidden);
        }
        Ok(order.into())
    }

    /// Loads an order by its public uuid.
    ///
    /// There is no ownership check: the uuid acts as a share link.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_uuid(&self, uuid: OrderUuid) -> Result<OrderView, DomainError> {
        self.store
            .get_order_by_uuid(uuid)
            .await?
            .map(OrderView::from)
            .ok_or(DomainError::NotFound {
                entity: "Order",
                id: 0,
            })
    }

    /// Overwrites the order's status, subject to the configured policy.
    ///
    /// Moving to `Delivered` stamps today's date as the delivery date.
    /// Moving to `Canceled` here does not restock; use [`Self::cancel_order`].
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderView, DomainError> {
        let order = self.load(id).await?;

        if !self.policy.allows(order.status, status) {
            return Err(DomainError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        let delivery_date = (status == OrderStatus::Delivered).then(|| Utc::now().date_naive());
        self.store
            .update_order_status(id, order.status, status, delivery_date)
            .await
            .map_err(|e| match e {
                StoreError::StatusConflict { actual, .. } => DomainError::InvalidTransition {
                    from: actual,
                    to: status,
                },
                other => other.into(),
            })?;

        metrics::counter!("order_status_updates_total", "status" => status.as_str()).increment(1);
        tracing::info!(order_id = %id, from = %order.status, to = %status, "order status updated");

        Ok(self.load(id).await?.into())
    }

    /// Cancels the user's own order and returns its quantities to stock.
    ///
    /// Returns `Ok(false)` if the order doesn't exist or belongs to someone
    /// else. Only `Open` and `Confirmed` orders can be canceled.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, user_id: UserId, id: OrderId) -> Result<bool, DomainError> {
        let Some(order) = self.store.get_order(id).await? else {
            return Ok(false);
        };
        if order.user_id != Some(user_id) {
            return Ok(false);
        }

        if !order.status.can_cancel() {
            return Err(DomainError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Canceled,
            });
        }

        match self.store.cancel_order(id, order.status).await {
            Ok(()) => {}
            Err(StoreError::StatusConflict { actual, .. }) => {
                return Err(DomainError::InvalidTransition {
                    from: actual,
                    to: OrderStatus::Canceled,
                });
            }
            Err(StoreError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        metrics::counter!("orders_canceled_total").increment(1);
        tracing::info!(order_id = %id, "order canceled, stock restored");
        Ok(true)
    }

    async fn load(&self, id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", id))
    }
}
