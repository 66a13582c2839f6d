//! Wishlist: a per-user set of products, created on first add.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId, WishlistId, WishlistItemId};
use serde::Serialize;
use store::{Store, StoreExt, Wishlist, WishlistEntry};

use crate::DomainError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItemView {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub in_stock: bool,
    pub added_at: DateTime<Utc>,
}

impl From<WishlistEntry> for WishlistItemView {
    fn from(entry: WishlistEntry) -> Self {
        Self {
            id: entry.id,
            product_id: entry.product_id,
            product_name: entry.product_name,
            product_image: entry.product_image,
            price: entry.price,
            original_price: entry.original_price,
            in_stock: entry.stock_quantity > 0,
            added_at: entry.added_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistView {
    /// Zero when the user has no wishlist yet.
    pub id: WishlistId,
    pub total_items: usize,
    pub items: Vec<WishlistItemView>,
}

impl WishlistView {
    pub fn empty() -> Self {
        Self {
            id: WishlistId::new(0),
            total_items: 0,
            items: Vec::new(),
        }
    }
}

impl From<Wishlist> for WishlistView {
    fn from(wishlist: Wishlist) -> Self {
        Self {
            id: wishlist.id,
            total_items: wishlist.entries.len(),
            items: wishlist
                .entries
                .into_iter()
                .map(WishlistItemView::from)
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct WishlistService<S: Store> {
    store: S,
}

impl<S: Store> WishlistService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_wishlist(&self, user_id: UserId) -> Result<WishlistView, DomainError> {
        Ok(self
            .store
            .get_wishlist(user_id)
            .await?
            .map(WishlistView::from)
            .unwrap_or_else(WishlistView::empty))
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<WishlistView, DomainError> {
        self.store.require_product(product_id).await?;

        let wishlist = self.store.get_or_create_wishlist(user_id).await?;
        if !self.store.add_wishlist_item(wishlist.id, product_id).await? {
            return Err(DomainError::AlreadyInWishlist);
        }

        self.get_wishlist(user_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<WishlistView, DomainError> {
        let Some(wishlist) = self.store.get_wishlist(user_id).await? else {
            return Err(DomainError::NotInWishlist);
        };
        if !self
            .store
            .remove_wishlist_item(wishlist.id, product_id)
            .await?
        {
            return Err(DomainError::NotInWishlist);
        }

        self.get_wishlist(user_id).await
    }

    /// Empties the wishlist. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn clear_wishlist(&self, user_id: UserId) -> Result<(), DomainError> {
        if let Some(wishlist) = self.store.get_wishlist(user_id).await? {
            self.store.clear_wishlist(wishlist.id).await?;
        }
        Ok(())
    }

    pub async fn is_in_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, DomainError> {
        Ok(self.store.is_in_wishlist(user_id, product_id).await?)
    }
}
