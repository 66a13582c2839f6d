use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{
    BrandId, CartId, CartItemId, CategoryId, OrderId, OrderItemId, OrderStatus, OrderUuid,
    ProductId, ReviewId, UserId, WishlistId, WishlistItemId,
};
use tokio::sync::RwLock;

use crate::model::{
    Brand, Cart, CartLine, Category, NewOrder, NewProduct, NewReview, NewUser, Order, OrderLine,
    Product, ProductFilter, ProductPatch, Review, ReviewPatch, User, Wishlist, WishlistEntry,
};
use crate::{Result, Store, StoreError};

#[derive(Debug, Clone)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: u32,
    added_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct WishlistRow {
    id: WishlistId,
    user_id: UserId,
}

#[derive(Debug, Clone)]
struct WishlistItemRow {
    id: WishlistItemId,
    wishlist_id: WishlistId,
    product_id: ProductId,
    added_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    brands: BTreeMap<BrandId, Brand>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, CartRow>,
    cart_items: BTreeMap<CartItemId, CartItemRow>,
    orders: BTreeMap<OrderId, Order>,
    reviews: BTreeMap<ReviewId, Review>,
    wishlists: BTreeMap<WishlistId, WishlistRow>,
    wishlist_items: BTreeMap<WishlistItemId, WishlistItemRow>,
    sequence: i64,
    fail_next_write: bool,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn take_injected_failure(&mut self) -> Result<()> {
        if std::mem::take(&mut self.fail_next_write) {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "injected write failure".to_string(),
            )));
        }
        Ok(())
    }

    fn cart_line(&self, item: &CartItemRow) -> Option<CartLine> {
        let product = self.products.get(&item.product_id)?;
        Some(CartLine {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            added_at: item.added_at,
            product_name: product.name.clone(),
            product_image: product.image.clone(),
            current_price: product.price,
            stock_available: product.stock_quantity,
        })
    }

    fn cart(&self, row: &CartRow) -> Cart {
        let lines = self
            .cart_items
            .values()
            .filter(|item| item.cart_id == row.id)
            .filter_map(|item| self.cart_line(item))
            .collect();
        Cart {
            id: row.id,
            user_id: row.user_id,
            lines,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn cart_for_user(&self, user_id: UserId) -> Option<&CartRow> {
        self.carts.values().find(|c| c.user_id == user_id)
    }

    fn order(&self, order: &Order) -> Order {
        let mut order = order.clone();
        for line in &mut order.lines {
            let product = line.product_id.and_then(|id| self.products.get(&id));
            line.product_name = product.map(|p| p.name.clone());
            line.product_image = product.and_then(|p| p.image.clone());
        }
        order
    }

    fn review(&self, review: &Review) -> Review {
        let mut review = review.clone();
        review.user_name = self
            .users
            .get(&review.user_id)
            .and_then(|u| u.full_name.clone());
        review
    }

    fn wishlist(&self, row: &WishlistRow) -> Wishlist {
        let entries = self
            .wishlist_items
            .values()
            .filter(|item| item.wishlist_id == row.id)
            .filter_map(|item| {
                let product = self.products.get(&item.product_id)?;
                Some(WishlistEntry {
                    id: item.id,
                    product_id: item.product_id,
                    product_name: product.name.clone(),
                    product_image: product.image.clone(),
                    price: product.price,
                    original_price: product.original_price,
                    stock_quantity: product.stock_quantity,
                    added_at: item.added_at,
                })
            })
            .collect();
        Wishlist {
            id: row.id,
            user_id: row.user_id,
            entries,
        }
    }

    fn order_status(&self, id: OrderId, expected: OrderStatus) -> Result<()> {
        let order = self.orders.get(&id).ok_or(StoreError::NotFound {
            entity: "Order",
            id: id.as_i64(),
        })?;
        if order.status != expected {
            return Err(StoreError::StatusConflict {
                order_id: id,
                expected,
                actual: order.status,
            });
        }
        Ok(())
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Every operation runs under a single lock, which gives multi-row
/// operations the same all-or-nothing behavior as the PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next multi-row write (`place_order`, `cancel_order`,
    /// `update_order_status`) fail with a database error before it commits.
    pub async fn fail_next_write(&self) {
        self.tables.write().await.fail_next_write = true;
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let user = User {
            id: UserId::new(t.next_id()),
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            address: user.address,
            active: true,
            created_at: Utc::now(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn insert_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        let mut t = self.tables.write().await;
        let category = Category {
            id: CategoryId::new(t.next_id()),
            name: name.to_string(),
            description: description.map(String::from),
        };
        t.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn insert_brand(&self, name: &str) -> Result<Brand> {
        let mut t = self.tables.write().await;
        let brand = Brand {
            id: BrandId::new(t.next_id()),
            name: name.to_string(),
        };
        t.brands.insert(brand.id, brand.clone());
        Ok(brand)
    }

    async fn list_brands(&self) -> Result<Vec<Brand>> {
        Ok(self.tables.read().await.brands.values().cloned().collect())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(t.next_id()),
            name: product.name,
            description: product.description,
            sku: product.sku,
            image: product.image,
            price: product.price,
            original_price: product.original_price,
            stock_quantity: product.stock_quantity,
            weight: product.weight,
            active: true,
            category_id: product.category_id,
            brand_id: product.brand_id,
            created_at: now,
            updated_at: now,
        };
        t.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(t.products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Option<Product>> {
        let mut t = self.tables.write().await;
        let Some(product) = t.products.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(product, Utc::now());
        Ok(Some(product.clone()))
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let t = self.tables.read().await;
        Ok(t.cart_for_user(user_id).map(|row| t.cart(row)))
    }

    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart> {
        let mut t = self.tables.write().await;
        if let Some(row) = t.cart_for_user(user_id) {
            return Ok(t.cart(row));
        }
        let now = Utc::now();
        let row = CartRow {
            id: CartId::new(t.next_id()),
            user_id,
            created_at: now,
            updated_at: now,
        };
        t.carts.insert(row.id, row.clone());
        Ok(t.cart(&row))
    }

    async fn save_cart_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut t = self.tables.write().await;
        if !t.products.contains_key(&product_id) {
            return Err(StoreError::NotFound {
                entity: "Product",
                id: product_id.as_i64(),
            });
        }
        let now = Utc::now();
        let cart = t.carts.get_mut(&cart_id).ok_or(StoreError::NotFound {
            entity: "Cart",
            id: cart_id.as_i64(),
        })?;
        cart.updated_at = now;

        let existing = t
            .cart_items
            .values()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
            .map(|i| i.id);
        let item_id = match existing {
            Some(id) => id,
            None => {
                let id = CartItemId::new(t.next_id());
                t.cart_items.insert(
                    id,
                    CartItemRow {
                        id,
                        cart_id,
                        product_id,
                        quantity,
                        added_at: now,
                    },
                );
                id
            }
        };
        let item = t
            .cart_items
            .get_mut(&item_id)
            .ok_or_else(|| StoreError::Corrupt(format!("cart item {item_id} vanished")))?;
        item.quantity = quantity;
        let item = item.clone();
        t.cart_line(&item)
            .ok_or_else(|| StoreError::Corrupt(format!("cart item {item_id} has no product")))
    }

    async fn remove_cart_line(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool> {
        let mut t = self.tables.write().await;
        let owned = t
            .cart_items
            .get(&item_id)
            .is_some_and(|i| i.cart_id == cart_id);
        if !owned {
            return Ok(false);
        }
        t.cart_items.remove(&item_id);
        if let Some(cart) = t.carts.get_mut(&cart_id) {
            cart.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        let mut t = self.tables.write().await;
        t.cart_items.retain(|_, i| i.cart_id != cart_id);
        if let Some(cart) = t.carts.get_mut(&cart_id) {
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn place_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut t = self.tables.write().await;

        if !t.carts.contains_key(&new_order.cart_id) {
            return Err(StoreError::NotFound {
                entity: "Cart",
                id: new_order.cart_id.as_i64(),
            });
        }

        // Check every line before touching anything so a rejection leaves no trace
        let mut requested: HashMap<ProductId, u32> = HashMap::new();
        for line in &new_order.lines {
            *requested.entry(line.product_id).or_default() += line.quantity;
        }
        for line in &new_order.lines {
            let product = t.products.get(&line.product_id).ok_or(StoreError::NotFound {
                entity: "Product",
                id: line.product_id.as_i64(),
            })?;
            let wanted = requested.get(&line.product_id).copied().unwrap_or_default();
            if product.stock_quantity < wanted {
                return Err(StoreError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                });
            }
        }
        t.take_injected_failure()?;

        let now = Utc::now();
        for (product_id, quantity) in &requested {
            if let Some(product) = t.products.get_mut(product_id) {
                product.stock_quantity -= quantity;
                product.updated_at = now;
            }
        }

        let order_id = OrderId::new(t.next_id());
        let mut lines = Vec::with_capacity(new_order.lines.len());
        for line in &new_order.lines {
            lines.push(OrderLine {
                id: OrderItemId::new(t.next_id()),
                product_id: Some(line.product_id),
                product_name: None,
                product_image: None,
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }
        let order = Order {
            id: order_id,
            uuid: new_order.uuid,
            user_id: Some(new_order.user_id),
            status: OrderStatus::Open,
            created_at: new_order.order_date,
            order_date: new_order.order_date,
            delivery_date: None,
            total_amount: new_order.total_amount,
            shipping: new_order.shipping,
            notes: new_order.notes,
            lines,
        };
        t.orders.insert(order_id, order.clone());

        // Lines added or changed since the cart was read stay for the next checkout.
        let ordered: HashSet<(ProductId, u32)> = new_order
            .lines
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect();
        t.cart_items.retain(|_, i| {
            i.cart_id != new_order.cart_id || !ordered.contains(&(i.product_id, i.quantity))
        });
        if let Some(cart) = t.carts.get_mut(&new_order.cart_id) {
            cart.updated_at = now;
        }

        Ok(t.order(&order))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let t = self.tables.read().await;
        Ok(t.orders.get(&id).map(|o| t.order(o)))
    }

    async fn get_order_by_uuid(&self, uuid: OrderUuid) -> Result<Option<Order>> {
        let t = self.tables.read().await;
        Ok(t.orders.values().find(|o| o.uuid == uuid).map(|o| t.order(o)))
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let t = self.tables.read().await;
        Ok(t.orders
            .values()
            .rev()
            .filter(|o| o.user_id == Some(user_id))
            .map(|o| t.order(o))
            .collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
        delivery_date: Option<NaiveDate>,
    ) -> Result<()> {
        let mut t = self.tables.write().await;
        t.order_status(id, expected)?;
        t.take_injected_failure()?;
        if let Some(order) = t.orders.get_mut(&id) {
            order.status = status;
            if delivery_date.is_some() {
                order.delivery_date = delivery_date;
            }
        }
        Ok(())
    }

    async fn cancel_order(&self, id: OrderId, expected: OrderStatus) -> Result<()> {
        let mut t = self.tables.write().await;
        t.order_status(id, expected)?;
        t.take_injected_failure()?;

        let t = &mut *t;
        let Some(order) = t.orders.get_mut(&id) else {
            return Ok(());
        };

        // Resolve every restock first so an overflow changes nothing
        let mut restock: HashMap<ProductId, u32> = HashMap::new();
        for line in &order.lines {
            let Some(product_id) = line.product_id else {
                continue;
            };
            let Some(product) = t.products.get(&product_id) else {
                continue;
            };
            let current = restock
                .get(&product_id)
                .copied()
                .unwrap_or(product.stock_quantity);
            let next = current
                .checked_add(line.quantity)
                .filter(|n| i32::try_from(*n).is_ok())
                .ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "restocking product {product_id} overflows stock_quantity"
                    ))
                })?;
            restock.insert(product_id, next);
        }

        order.status = OrderStatus::Canceled;
        let now = Utc::now();
        for (product_id, stock) in restock {
            if let Some(product) = t.products.get_mut(&product_id) {
                product.stock_quantity = stock;
                product.updated_at = now;
            }
        }
        Ok(())
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review> {
        let mut t = self.tables.write().await;
        let duplicate = t
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.product_id == review.product_id);
        if duplicate {
            return Err(StoreError::UniqueViolation(
                "reviews_user_id_product_id_key".to_string(),
            ));
        }
        let now = Utc::now();
        let review = Review {
            id: ReviewId::new(t.next_id()),
            product_id: review.product_id,
            user_id: review.user_id,
            user_name: None,
            rating: review.rating,
            title: review.title,
            comment: review.comment,
            created_at: now,
            updated_at: now,
        };
        t.reviews.insert(review.id, review.clone());
        Ok(t.review(&review))
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>> {
        let t = self.tables.read().await;
        Ok(t.reviews.get(&id).map(|r| t.review(r)))
    }

    async fn find_review(&self, user_id: UserId, product_id: ProductId) -> Result<Option<Review>> {
        let t = self.tables.read().await;
        Ok(t.reviews
            .values()
            .find(|r| r.user_id == user_id && r.product_id == product_id)
            .map(|r| t.review(r)))
    }

    async fn list_reviews_for_product(&self, product_id: ProductId) -> Result<Vec<Review>> {
        let t = self.tables.read().await;
        Ok(t.reviews
            .values()
            .rev()
            .filter(|r| r.product_id == product_id)
            .map(|r| t.review(r))
            .collect())
    }

    async fn update_review(&self, id: ReviewId, patch: ReviewPatch) -> Result<Option<Review>> {
        let mut t = self.tables.write().await;
        let Some(review) = t.reviews.get_mut(&id) else {
            return Ok(None);
        };
        review.rating = patch.rating;
        review.title = patch.title;
        review.comment = patch.comment;
        review.updated_at = Utc::now();
        let review = review.clone();
        Ok(Some(t.review(&review)))
    }

    async fn delete_review(&self, id: ReviewId) -> Result<bool> {
        Ok(self.tables.write().await.reviews.remove(&id).is_some())
    }

    async fn get_wishlist(&self, user_id: UserId) -> Result<Option<Wishlist>> {
        let t = self.tables.read().await;
        Ok(t.wishlists
            .values()
            .find(|w| w.user_id == user_id)
            .map(|row| t.wishlist(row)))
    }

    async fn get_or_create_wishlist(&self, user_id: UserId) -> Result<Wishlist> {
        let mut t = self.tables.write().await;
        if let Some(row) = t.wishlists.values().find(|w| w.user_id == user_id) {
            return Ok(t.wishlist(row));
        }
        let row = WishlistRow {
            id: WishlistId::new(t.next_id()),
            user_id,
        };
        t.wishlists.insert(row.id, row.clone());
        Ok(t.wishlist(&row))
    }

    async fn add_wishlist_item(
        &self,
        wishlist_id: WishlistId,
        product_id: ProductId,
    ) -> Result<bool> {
        let mut t = self.tables.write().await;
        if !t.wishlists.contains_key(&wishlist_id) {
            return Err(StoreError::NotFound {
                entity: "Wishlist",
                id: wishlist_id.as_i64(),
            });
        }
        let present = t
            .wishlist_items
            .values()
            .any(|i| i.wishlist_id == wishlist_id && i.product_id == product_id);
        if present {
            return Ok(false);
        }
        let id = WishlistItemId::new(t.next_id());
        t.wishlist_items.insert(
            id,
            WishlistItemRow {
                id,
                wishlist_id,
                product_id,
                added_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn remove_wishlist_item(
        &self,
        wishlist_id: WishlistId,
        product_id: ProductId,
    ) -> Result<bool> {
        let mut t = self.tables.write().await;
        let before = t.wishlist_items.len();
        t.wishlist_items
            .retain(|_, i| !(i.wishlist_id == wishlist_id && i.product_id == product_id));
        Ok(t.wishlist_items.len() < before)
    }

    async fn clear_wishlist(&self, wishlist_id: WishlistId) -> Result<()> {
        self.tables
            .write()
            .await
            .wishlist_items
            .retain(|_, i| i.wishlist_id != wishlist_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Money;

    use crate::model::{Address, NewOrderLine};

    async fn seed_product(store: &InMemoryStore, stock: u32, cents: i64) -> Product {
        store
            .insert_product(NewProduct {
                name: "Dumbbell".to_string(),
                price: Money::from_cents(cents),
                stock_quantity: stock,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn new_order(user_id: UserId, cart_id: CartId, lines: Vec<NewOrderLine>) -> NewOrder {
        NewOrder {
            uuid: OrderUuid::new(),
            user_id,
            cart_id,
            order_date: Utc::now().date_naive(),
            total_amount: lines.iter().map(|l| l.unit_price.multiply(l.quantity)).sum(),
            shipping: Address::default(),
            notes: None,
            lines,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_cart_is_idempotent() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);

        let first = store.get_or_create_cart(user).await.unwrap();
        let second = store.get_or_create_cart(user).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(store.get_cart(user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_cart_line_overwrites_quantity() {
        let store = InMemoryStore::new();
        let product = seed_product(&store, 10, 500).await;
        let cart = store.get_or_create_cart(UserId::new(1)).await.unwrap();

        let first = store.save_cart_line(cart.id, product.id, 2).await.unwrap();
        let second = store.save_cart_line(cart.id, product.id, 5).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(second.current_price, Money::from_cents(500));
        let cart = store.get_cart(UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(cart.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_decrements_and_clears_cart() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let product = seed_product(&store, 5, 1000).await;
        let cart = store.get_or_create_cart(user).await.unwrap();
        store.save_cart_line(cart.id, product.id, 3).await.unwrap();

        let order = store
            .place_order(new_order(
                user,
                cart.id,
                vec![NewOrderLine {
                    product_id: product.id,
                    unit_price: product.price,
                    quantity: 3,
                }],
            ))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.lines[0].product_name.as_deref(), Some("Dumbbell"));
        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 2);
        let cart = store.get_cart(user).await.unwrap().unwrap();
        assert!(cart.lines.is_empty());
    }

    #[tokio::test]
    async fn test_place_order_rejects_and_leaves_no_trace() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let plenty = seed_product(&store, 10, 100).await;
        let scarce = seed_product(&store, 1, 100).await;
        let cart = store.get_or_create_cart(user).await.unwrap();
        store.save_cart_line(cart.id, plenty.id, 4).await.unwrap();
        store.save_cart_line(cart.id, scarce.id, 2).await.unwrap();

        let result = store
            .place_order(new_order(
                user,
                cart.id,
                vec![
                    NewOrderLine {
                        product_id: plenty.id,
                        unit_price: plenty.price,
                        quantity: 4,
                    },
                    NewOrderLine {
                        product_id: scarce.id,
                        unit_price: scarce.price,
                        quantity: 2,
                    },
                ],
            ))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { product_id, requested: 2 }) if product_id == scarce.id
        ));
        assert_eq!(
            store.get_product(plenty.id).await.unwrap().unwrap().stock_quantity,
            10
        );
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.get_cart(user).await.unwrap().unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_rolls_back_place_order() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let product = seed_product(&store, 5, 100).await;
        let cart = store.get_or_create_cart(user).await.unwrap();
        store.save_cart_line(cart.id, product.id, 1).await.unwrap();
        store.fail_next_write().await;

        let result = store
            .place_order(new_order(
                user,
                cart.id,
                vec![NewOrderLine {
                    product_id: product.id,
                    unit_price: product.price,
                    quantity: 1,
                }],
            ))
            .await;

        assert!(matches!(result, Err(StoreError::Database(_))));
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock_quantity,
            5
        );
        assert_eq!(store.get_cart(user).await.unwrap().unwrap().lines.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_order_compare_and_swap() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let product = seed_product(&store, 5, 100).await;
        let cart = store.get_or_create_cart(user).await.unwrap();
        let order = store
            .place_order(new_order(
                user,
                cart.id,
                vec![NewOrderLine {
                    product_id: product.id,
                    unit_price: product.price,
                    quantity: 3,
                }],
            ))
            .await
            .unwrap();

        store
            .cancel_order(order.id, OrderStatus::Open)
            .await
            .unwrap();
        let again = store.cancel_order(order.id, OrderStatus::Open).await;

        assert!(matches!(
            again,
            Err(StoreError::StatusConflict {
                actual: OrderStatus::Canceled,
                ..
            })
        ));
        // Restored exactly once
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock_quantity,
            5
        );
    }

    #[tokio::test]
    async fn test_place_order_keeps_lines_added_after_the_cart_was_read() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let ordered = seed_product(&store, 5, 1000).await;
        let late = seed_product(&store, 5, 200).await;
        let cart = store.get_or_create_cart(user).await.unwrap();
        store.save_cart_line(cart.id, ordered.id, 2).await.unwrap();

        let pending = new_order(
            user,
            cart.id,
            vec![NewOrderLine {
                product_id: ordered.id,
                unit_price: ordered.price,
                quantity: 2,
            }],
        );
        store.save_cart_line(cart.id, late.id, 1).await.unwrap();
        store.place_order(pending).await.unwrap();

        let cart = store.get_cart(user).await.unwrap().unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].product_id, late.id);
        assert_eq!(cart.lines[0].quantity, 1);
        assert_eq!(
            store.get_product(late.id).await.unwrap().unwrap().stock_quantity,
            5
        );
        assert_eq!(
            store.get_product(ordered.id).await.unwrap().unwrap().stock_quantity,
            3
        );
    }

    #[tokio::test]
    async fn test_cancel_order_restock_overflow_changes_nothing() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let product = seed_product(&store, 10, 100).await;
        let cart = store.get_or_create_cart(user).await.unwrap();
        let order = store
            .place_order(new_order(
                user,
                cart.id,
                vec![NewOrderLine {
                    product_id: product.id,
                    unit_price: product.price,
                    quantity: 3,
                }],
            ))
            .await
            .unwrap();

        store
            .update_product(
                product.id,
                ProductPatch {
                    stock_quantity: Some(u32::MAX - 1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = store.cancel_order(order.id, OrderStatus::Open).await;

        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock_quantity,
            u32::MAX - 1
        );
        let order = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn test_update_status_missing_order() {
        let store = InMemoryStore::new();
        let result = store
            .update_order_status(OrderId::new(99), OrderStatus::Open, OrderStatus::Paid, None)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "Order", .. })));
    }

    #[tokio::test]
    async fn test_wishlist_add_is_set_like() {
        let store = InMemoryStore::new();
        let user = UserId::new(1);
        let product = seed_product(&store, 1, 100).await;
        let wishlist = store.get_or_create_wishlist(user).await.unwrap();

        assert!(store.add_wishlist_item(wishlist.id, product.id).await.unwrap());
        assert!(!store.add_wishlist_item(wishlist.id, product.id).await.unwrap());
        assert!(
            store
                .remove_wishlist_item(wishlist.id, product.id)
                .await
                .unwrap()
        );
        assert!(
            !store
                .remove_wishlist_item(wishlist.id, product.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_duplicate_review_violates_uniqueness() {
        let store = InMemoryStore::new();
        let review = NewReview {
            product_id: ProductId::new(1),
            user_id: UserId::new(2),
            rating: 4,
            title: None,
            comment: None,
        };
        store.insert_review(review.clone()).await.unwrap();
        let result = store.insert_review(review).await;
        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
    }
}
