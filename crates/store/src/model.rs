//! Rows and write inputs persisted by the store.

use chrono::{DateTime, NaiveDate, Utc};
use common::{
    BrandId, CartId, CartItemId, CategoryId, Money, OrderId, OrderItemId, OrderStatus, OrderUuid,
    ProductId, ReviewId, UserId, WishlistId, WishlistItemId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Authorization role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    #[default]
    Client,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Admin => "Admin",
        }
    }

    /// Parses a stored role name. Anything other than `Admin` is a client.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Client
        }
    }
}

/// Postal address, used both on the user profile and as an order's shipping snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    /// Fills every field missing here from `fallback`.
    pub fn or(self, fallback: &Address) -> Address {
        Address {
            address: self.address.or_else(|| fallback.address.clone()),
            city: self.city.or_else(|| fallback.city.clone()),
            state: self.state.or_else(|| fallback.state.clone()),
            zip_code: self.zip_code.or_else(|| fallback.zip_code.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub full_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub address: Address,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
}

/// A catalog product. `stock_quantity` is the live sellable count.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub stock_quantity: u32,
    pub weight: Option<Decimal>,
    pub active: bool,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub stock_quantity: u32,
    pub weight: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
}

/// Partial product update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Money>,
    pub stock_quantity: Option<u32>,
    pub weight: Option<Decimal>,
    pub active: Option<bool>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
}

impl ProductPatch {
    pub(crate) fn apply(self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(sku) = self.sku {
            product.sku = Some(sku);
        }
        if let Some(image) = self.image {
            product.image = Some(image);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(original_price) = self.original_price {
            product.original_price = Some(original_price);
        }
        if let Some(stock) = self.stock_quantity {
            product.stock_quantity = stock;
        }
        if let Some(weight) = self.weight {
            product.weight = Some(weight);
        }
        if let Some(active) = self.active {
            product.active = active;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(brand_id) = self.brand_id {
            product.brand_id = Some(brand_id);
        }
        product.updated_at = now;
    }
}

/// Catalog listing filter.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    /// Case-insensitive match against name and description.
    pub search: Option<String>,
    pub include_inactive: bool,
}

impl ProductFilter {
    /// Returns true if the product passes every criterion.
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.active {
            return false;
        }
        if let Some(category_id) = self.category_id
            && product.category_id != Some(category_id)
        {
            return false;
        }
        if let Some(brand_id) = self.brand_id
            && product.brand_id != Some(brand_id)
        {
            return false;
        }
        if let Some(ref term) = self.search {
            let term = term.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&term);
            let in_description = product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term));
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }
}

/// A user's cart with its lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Returns the line holding `product_id`, if any.
    pub fn line_for_product(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Returns the line with the given id, if any.
    pub fn line(&self, item_id: CartItemId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == item_id)
    }
}

/// One cart line joined with the live product row.
///
/// `current_price` and `stock_available` are read at query time and change
/// whenever the product does.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
    pub product_name: String,
    pub product_image: Option<String>,
    pub current_price: Money,
    pub stock_available: u32,
}

/// An order with its frozen line snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub uuid: OrderUuid,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub created_at: NaiveDate,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub total_amount: Money,
    pub shipping: Address,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
}

/// One purchased line. `unit_price` was frozen at checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub id: OrderItemId,
    /// `None` once the product row has been removed.
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Everything `place_order` needs to commit a checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub uuid: OrderUuid,
    pub user_id: UserId,
    /// Cart whose lines are deleted in the same unit of work.
    pub cart_id: CartId,
    pub order_date: NaiveDate,
    pub total_amount: Money,
    pub shipping: Address,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub rating: u8,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: u8,
    pub title: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReviewPatch {
    pub rating: u8,
    pub title: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wishlist {
    pub id: WishlistId,
    pub user_id: UserId,
    pub entries: Vec<WishlistEntry>,
}

/// A wishlisted product joined with its live catalog row.
#[derive(Debug, Clone, PartialEq)]
pub struct WishlistEntry {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub stock_quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, description: Option<&str>) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            name: name.to_string(),
            description: description.map(String::from),
            sku: None,
            image: None,
            price: Money::from_cents(1000),
            original_price: None,
            stock_quantity: 5,
            weight: None,
            active: true,
            category_id: Some(CategoryId::new(3)),
            brand_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn filter_hides_inactive_by_default() {
        let mut p = product("Kettlebell", None);
        p.active = false;
        assert!(!ProductFilter::default().matches(&p));

        let filter = ProductFilter {
            include_inactive: true,
            ..Default::default()
        };
        assert!(filter.matches(&p));
    }

    #[test]
    fn filter_search_is_case_insensitive_over_name_and_description() {
        let p = product("Kettlebell", Some("Cast iron, 16kg"));
        let by_name = ProductFilter {
            search: Some("KETTLE".to_string()),
            ..Default::default()
        };
        let by_description = ProductFilter {
            search: Some("cast iron".to_string()),
            ..Default::default()
        };
        let miss = ProductFilter {
            search: Some("yoga".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(&p));
        assert!(by_description.matches(&p));
        assert!(!miss.matches(&p));
    }

    #[test]
    fn filter_by_category() {
        let p = product("Mat", None);
        let same = ProductFilter {
            category_id: Some(CategoryId::new(3)),
            ..Default::default()
        };
        let other = ProductFilter {
            category_id: Some(CategoryId::new(4)),
            ..Default::default()
        };
        assert!(same.matches(&p));
        assert!(!other.matches(&p));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut p = product("Mat", None);
        let before = p.clone();
        ProductPatch {
            price: Some(Money::from_cents(1500)),
            ..Default::default()
        }
        .apply(&mut p, Utc::now());
        assert_eq!(p.price, Money::from_cents(1500));
        assert_eq!(p.name, before.name);
        assert_eq!(p.stock_quantity, before.stock_quantity);
    }

    #[test]
    fn address_fallback_fills_only_missing_fields() {
        let profile = Address {
            address: Some("1 Main St".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            zip_code: Some("62701".to_string()),
        };
        let requested = Address {
            city: Some("Shelbyville".to_string()),
            ..Default::default()
        };
        let merged = requested.or(&profile);
        assert_eq!(merged.city.as_deref(), Some("Shelbyville"));
        assert_eq!(merged.address.as_deref(), Some("1 Main St"));
        assert_eq!(merged.zip_code.as_deref(), Some("62701"));
    }

    #[test]
    fn role_parse_defaults_to_client() {
        assert_eq!(Role::parse("Admin"), Role::Admin);
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("Client"), Role::Client);
        assert_eq!(Role::parse(""), Role::Client);
    }
}
