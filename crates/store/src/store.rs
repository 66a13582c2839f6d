use async_trait::async_trait;
use chrono::NaiveDate;
use common::{
    CartId, CartItemId, OrderId, OrderStatus, OrderUuid, ProductId, ReviewId, UserId, WishlistId,
};

use crate::model::{
    Brand, Cart, CartLine, Category, NewOrder, NewProduct, NewReview, NewUser, Order, Product,
    ProductFilter, ProductPatch, Review, ReviewPatch, User, Wishlist,
};
use crate::Result;

/// Core trait for storefront persistence.
///
/// Implementations must be thread-safe (Send + Sync). Operations that touch
/// more than one row for a single business step (`place_order`,
/// `cancel_order`) are atomic: either every write lands or none does.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Users --

    /// Registers a user. Fails with `UniqueViolation` on a duplicate email.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    // -- Catalog --

    async fn insert_category(&self, name: &str, description: Option<&str>) -> Result<Category>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn insert_brand(&self, name: &str) -> Result<Brand>;

    async fn list_brands(&self) -> Result<Vec<Brand>>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products matching the filter, ordered by id.
    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>>;

    /// Applies a partial update. Returns None if the product doesn't exist.
    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Option<Product>>;

    // -- Cart --

    /// Loads the user's cart joined with live product data.
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Returns the user's cart, creating an empty one if none exists.
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart>;

    /// Sets the quantity of the line holding `product_id`, inserting the line
    /// if the cart doesn't have one yet. Touches the cart's `updated_at`.
    async fn save_cart_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine>;

    /// Deletes one line. Returns false if the cart had no such line.
    async fn remove_cart_line(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool>;

    /// Deletes every line of the cart. The cart row itself is kept.
    async fn clear_cart(&self, cart_id: CartId) -> Result<()>;

    // -- Orders --

    /// Commits a checkout as one unit of work.
    ///
    /// For every line the product's stock is decremented only if at least
    /// `quantity` units remain; otherwise the whole unit is rolled back with
    /// `InsufficientStock`. The order, its lines and the clearing of the
    /// cart are written in the same transaction.
    async fn place_order(&self, order: NewOrder) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn get_order_by_uuid(&self, uuid: OrderUuid) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Overwrites the status if it still equals `expected`.
    ///
    /// `delivery_date`, when given, is stamped in the same write. Fails with
    /// `StatusConflict` if the status moved concurrently.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
        delivery_date: Option<NaiveDate>,
    ) -> Result<()>;

    /// Sets the status to `Canceled` if it still equals `expected` and
    /// returns every line's quantity to its product's stock. Lines whose
    /// product no longer exists are skipped.
    async fn cancel_order(&self, id: OrderId, expected: OrderStatus) -> Result<()>;

    // -- Reviews --

    /// Inserts a review. Fails with `UniqueViolation` if the user already
    /// reviewed the product.
    async fn insert_review(&self, review: NewReview) -> Result<Review>;

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>>;

    async fn find_review(&self, user_id: UserId, product_id: ProductId) -> Result<Option<Review>>;

    /// Lists a product's reviews, newest first.
    async fn list_reviews_for_product(&self, product_id: ProductId) -> Result<Vec<Review>>;

    async fn update_review(&self, id: ReviewId, patch: ReviewPatch) -> Result<Option<Review>>;

    async fn delete_review(&self, id: ReviewId) -> Result<bool>;

    // -- Wishlist --

    async fn get_wishlist(&self, user_id: UserId) -> Result<Option<Wishlist>>;

    async fn get_or_create_wishlist(&self, user_id: UserId) -> Result<Wishlist>;

    /// Adds a product. Returns false if it was already in the wishlist.
    async fn add_wishlist_item(&self, wishlist_id: WishlistId, product_id: ProductId)
    -> Result<bool>;

    /// Removes a product. Returns false if it wasn't in the wishlist.
    async fn remove_wishlist_item(
        &self,
        wishlist_id: WishlistId,
        product_id: ProductId,
    ) -> Result<bool>;

    async fn clear_wishlist(&self, wishlist_id: WishlistId) -> Result<()>;
}

/// Extension trait providing convenience lookups for stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Loads a product, failing with `NotFound` if it doesn't exist.
    async fn require_product(&self, id: ProductId) -> Result<Product> {
        self.get_product(id)
            .await?
            .ok_or(crate::StoreError::NotFound {
                entity: "Product",
                id: id.as_i64(),
            })
    }

    /// Returns true if the product is in the user's wishlist.
    async fn is_in_wishlist(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        Ok(self
            .get_wishlist(user_id)
            .await?
            .is_some_and(|w| w.entries.iter().any(|e| e.product_id == product_id)))
    }
}

// Blanket implementation for all Store implementations
impl<T: Store + ?Sized> StoreExt for T {}
