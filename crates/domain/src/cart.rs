//! Shopping cart.
//!
//! One cart per user, created on first add. Line prices are read live from
//! the catalog at view time and are never frozen here.

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, Money, ProductId, UserId};
use serde::Serialize;
use store::{Cart, CartLine, Store};

use crate::{DomainError, UserLocks};

/// One cart line priced at the product's current price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub total: Money,
    pub stock_available: u32,
    pub added_at: DateTime<Utc>,
}

impl From<CartLine> for CartLineView {
    fn from(line: CartLine) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            product_name: line.product_name,
            product_image: line.product_image,
            unit_price: line.current_price,
            quantity: line.quantity,
            total: line.current_price.multiply(line.quantity),
            stock_available: line.stock_available,
            added_at: line.added_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    /// Zero when the user has no cart yet.
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartLineView>,
    pub subtotal: Money,
    pub total_items: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartView {
    /// The view of a user who never added anything.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            id: CartId::new(0),
            user_id,
            items: Vec::new(),
            subtotal: Money::zero(),
            total_items: 0,
            updated_at: None,
        }
    }
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let items: Vec<CartLineView> = cart.lines.into_iter().map(CartLineView::from).collect();
        Self {
            id: cart.id,
            user_id: cart.user_id,
            subtotal: items.iter().map(|l| l.total).sum(),
            total_items: items.iter().map(|l| l.quantity).sum(),
            items,
            updated_at: Some(cart.updated_at),
        }
    }
}

/// Service for building a cart ahead of checkout.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
    locks: UserLocks,
}

impl<S: Store> CartService<S> {
    /// Creates a cart service. `locks` must be shared with the order service.
    pub fn new(store: S, locks: UserLocks) -> Self {
        Self { store, locks }
    }

    /// Returns the user's cart, or an empty view if there is none. Never fails
    /// for a missing cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView, DomainError> {
        Ok(self
            .store
            .get_cart(user_id)
            .await?
            .map(CartView::from)
            .unwrap_or_else(|| CartView::empty(user_id)))
    }

    /// Adds `quantity` units of a product, summing into an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }

        let _guard = self.locks.lock(user_id).await;

        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| DomainError::not_found("Product", product_id))?;

        let cart = self.store.get_or_create_cart(user_id).await?;
        let existing = cart
            .line_for_product(product_id)
            .map(|l| l.quantity)
            .unwrap_or(0);
        let requested = existing.saturating_add(quantity);

        if requested > product.stock_quantity {
            return Err(DomainError::InsufficientStock {
                product_id,
                product_name: product.name,
                requested,
                available: product.stock_quantity,
            });
        }

        self.store
            .save_cart_line(cart.id, product_id, requested)
            .await?;
        metrics::counter!("cart_mutations_total", "op" => "add").increment(1);

        self.get_cart(user_id).await
    }

    /// Sets a line's quantity. Zero or less removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i64,
    ) -> Result<CartView, DomainError> {
        let _guard = self.locks.lock(user_id).await;

        let cart = self
            .store
            .get_cart(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Cart", user_id))?;
        let line = cart
            .line(item_id)
            .ok_or_else(|| DomainError::not_found("CartItem", item_id))?;

        if quantity <= 0 {
            self.store.remove_cart_line(cart.id, item_id).await?;
            metrics::counter!("cart_mutations_total", "op" => "remove").increment(1);
            return self.get_cart(user_id).await;
        }

        let product = self
            .store
            .get_product(line.product_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| DomainError::not_found("Product", line.product_id))?;

        let requested = u32::try_from(quantity).unwrap_or(u32::MAX);
        if requested > product.stock_quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                requested,
                available: product.stock_quantity,
            });
        }

        self.store
            .save_cart_line(cart.id, line.product_id, requested)
            .await?;
        metrics::counter!("cart_mutations_total", "op" => "update").increment(1);

        self.get_cart(user_id).await
    }

    /// Removes a line. Removing an absent line is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<CartView, DomainError> {
        let _guard = self.locks.lock(user_id).await;

        if let Some(cart) = self.store.get_cart(user_id).await?
            && self.store.remove_cart_line(cart.id, item_id).await?
        {
            metrics::counter!("cart_mutations_total", "op" => "remove").increment(1);
        }

        self.get_cart(user_id).await
    }

    /// Empties the cart. Clearing a missing or empty cart is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<(), DomainError> {
        let _guard = self.locks.lock(user_id).await;

        if let Some(cart) = self.store.get_cart(user_id).await? {
            self.store.clear_cart(cart.id).await?;
            metrics::counter!("cart_mutations_total", "op" => "clear").increment(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use store::{InMemoryStore, NewProduct, ProductPatch, StoreExt};

    use super::*;

    async fn setup(stock: u32) -> (InMemoryStore, CartService<InMemoryStore>, ProductId) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct {
                name: "Dumbbell".to_string(),
                price: Money::from_cents(1000),
                stock_quantity: stock,
                ..Default::default()
            })
            .await
            .unwrap();
        let service = CartService::new(store.clone(), UserLocks::new());
        (store, service, product.id)
    }

    #[tokio::test]
    async fn missing_cart_is_an_empty_view() {
        let (_, service, _) = setup(5).await;
        let view = service.get_cart(UserId::new(9)).await.unwrap();
        assert_eq!(view.id, CartId::new(0));
        assert!(view.items.is_empty());
        assert_eq!(view.subtotal, Money::zero());
        assert_eq!(view.total_items, 0);
    }

    #[tokio::test]
    async fn add_sums_into_existing_line() {
        let (_, service, product) = setup(5).await;
        let user = UserId::new(1);

        service.add_item(user, product, 2).await.unwrap();
        let view = service.add_item(user, product, 1).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 3);
        assert_eq!(view.total_items, 3);
        assert_eq!(view.subtotal, Money::from_cents(3000));
    }

    #[tokio::test]
    async fn add_checks_the_summed_quantity_against_stock() {
        let (_, service, product) = setup(5).await;
        let user = UserId::new(1);

        service.add_item(user, product, 4).await.unwrap();
        let result = service.add_item(user, product, 2).await;
        match result {
            Err(DomainError::InsufficientStock {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(service.get_cart(user).await.unwrap().total_items, 4);
    }

    #[tokio::test]
    async fn add_rejects_zero_and_unknown_or_inactive_products() {
        let (store, service, product) = setup(5).await;
        let user = UserId::new(1);

        assert!(matches!(
            service.add_item(user, product, 0).await,
            Err(DomainError::InvalidQuantity)
        ));
        assert!(matches!(
            service.add_item(user, ProductId::new(999), 1).await,
            Err(DomainError::NotFound { entity: "Product", .. })
        ));

        store
            .update_product(
                product,
                ProductPatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            service.add_item(user, product, 1).await,
            Err(DomainError::NotFound { entity: "Product", .. })
        ));
    }

    #[tokio::test]
    async fn update_to_zero_removes_the_line() {
        let (_, service, product) = setup(5).await;
        let user = UserId::new(1);

        let view = service.add_item(user, product, 2).await.unwrap();
        let item = view.items[0].id;

        let view = service.update_item_quantity(user, item, 0).await.unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_quantity_and_rechecks_stock() {
        let (_, service, product) = setup(5).await;
        let user = UserId::new(1);

        let view = service.add_item(user, product, 2).await.unwrap();
        let item = view.items[0].id;

        let view = service.update_item_quantity(user, item, 5).await.unwrap();
        assert_eq!(view.items[0].quantity, 5);

        assert!(matches!(
            service.update_item_quantity(user, item, 6).await,
            Err(DomainError::InsufficientStock { .. })
        ));
        assert!(matches!(
            service
                .update_item_quantity(user, CartItemId::new(999), 1)
                .await,
            Err(DomainError::NotFound { entity: "CartItem", .. })
        ));
    }

    #[tokio::test]
    async fn update_rejects_deactivated_product_but_still_removes() {
        let (store, service, product) = setup(5).await;
        let user = UserId::new(1);

        let view = service.add_item(user, product, 1).await.unwrap();
        let item = view.items[0].id;

        store
            .update_product(
                product,
                ProductPatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            service.update_item_quantity(user, item, 3).await,
            Err(DomainError::NotFound { entity: "Product", .. })
        ));
        assert_eq!(service.get_cart(user).await.unwrap().total_items, 1);

        let view = service.update_item_quantity(user, item, 0).await.unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn cart_prices_follow_the_live_product() {
        let (store, service, product) = setup(5).await;
        let user = UserId::new(1);
        service.add_item(user, product, 2).await.unwrap();

        store
            .update_product(
                product,
                ProductPatch {
                    price: Some(Money::from_cents(1250)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let view = service.get_cart(user).await.unwrap();
        assert_eq!(view.items[0].unit_price, Money::from_cents(1250));
        assert_eq!(view.subtotal, Money::from_cents(2500));
        assert_eq!(store.require_product(product).await.unwrap().stock_quantity, 5);
    }

    #[tokio::test]
    async fn remove_and_clear_are_idempotent() {
        let (_, service, product) = setup(5).await;
        let user = UserId::new(1);

        // Nothing to clear yet
        service.clear_cart(user).await.unwrap();

        let view = service.add_item(user, product, 2).await.unwrap();
        let item = view.items[0].id;

        service.remove_item(user, item).await.unwrap();
        let view = service.remove_item(user, item).await.unwrap();
        assert!(view.items.is_empty());

        service.add_item(user, product, 1).await.unwrap();
        service.clear_cart(user).await.unwrap();
        service.clear_cart(user).await.unwrap();
        assert!(service.get_cart(user).await.unwrap().items.is_empty());
    }
}
