//! Catalog: products, categories and brands.

use chrono::{DateTime, Utc};
use common::{BrandId, CategoryId, Money, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{Brand, Category, NewProduct, Product, ProductFilter, ProductPatch, Store};

use crate::DomainError;

/// Product as exposed to clients, always reflecting the live row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub stock_quantity: u32,
    pub in_stock: bool,
    pub weight: Option<Decimal>,
    pub active: bool,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            sku: p.sku,
            image: p.image,
            price: p.price,
            original_price: p.original_price,
            in_stock: p.stock_quantity > 0,
            stock_quantity: p.stock_quantity,
            weight: p.weight,
            active: p.active,
            category_id: p.category_id,
            brand_id: p.brand_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    #[serde(default)]
    pub stock_quantity: u32,
    pub weight: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
}

/// Input for a partial product update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
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

fn check_prices(price: Option<Money>, original_price: Option<Money>) -> Result<(), DomainError> {
    if price.is_some_and(|p| p.is_negative()) || original_price.is_some_and(|p| p.is_negative()) {
        return Err(DomainError::InvalidPrice);
    }
    Ok(())
}

/// Service for browsing and administering the catalog.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: ProductInput) -> Result<ProductView, DomainError> {
        check_prices(Some(input.price), input.original_price)?;

        let product = self
            .store
            .insert_product(NewProduct {
                name: input.name,
                description: input.description,
                sku: input.sku,
                image: input.image,
                price: input.price,
                original_price: input.original_price,
                stock_quantity: input.stock_quantity,
                weight: input.weight,
                category_id: input.category_id,
                brand_id: input.brand_id,
            })
            .await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product.into())
    }

    /// Loads a product by id, including inactive ones.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<ProductView, DomainError> {
        self.store
            .get_product(id)
            .await?
            .map(ProductView::from)
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, filter: ProductFilter) -> Result<Vec<ProductView>, DomainError> {
        let products = self.store.list_products(filter).await?;
        Ok(products.into_iter().map(ProductView::from).collect())
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<ProductView, DomainError> {
        check_prices(update.price, update.original_price)?;

        let patch = ProductPatch {
            name: update.name,
            description: update.description,
            sku: update.sku,
            image: update.image,
            price: update.price,
            original_price: update.original_price,
            stock_quantity: update.stock_quantity,
            weight: update.weight,
            active: update.active,
            category_id: update.category_id,
            brand_id: update.brand_id,
        };

        self.store
            .update_product(id, patch)
            .await?
            .map(ProductView::from)
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    /// Soft-deletes a product so historical order lines keep their reference.
    ///
    /// Returns false if the product doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_product(&self, id: ProductId) -> Result<bool, DomainError> {
        let patch = ProductPatch {
            active: Some(false),
            ..Default::default()
        };
        let deactivated = self.store.update_product(id, patch).await?.is_some();
        if deactivated {
            tracing::info!(product_id = %id, "product deactivated");
        }
        Ok(deactivated)
    }

    /// Overwrites the stock counter. Admin correction, outside the checkout flow.
    #[tracing::instrument(skip(self))]
    pub async fn set_stock(&self, id: ProductId, quantity: u32) -> Result<ProductView, DomainError> {
        let patch = ProductPatch {
            stock_quantity: Some(quantity),
            ..Default::default()
        };
        let product = self
            .store
            .update_product(id, patch)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))?;

        tracing::info!(product_id = %id, quantity, "stock overwritten");
        Ok(product.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, DomainError> {
        Ok(self.store.insert_category(name, description).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, DomainError> {
        Ok(self.store.list_categories().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_brand(&self, name: &str) -> Result<Brand, DomainError> {
        Ok(self.store.insert_brand(name).await?)
    }

    pub async fn list_brands(&self) -> Result<Vec<Brand>, DomainError> {
        Ok(self.store.list_brands().await?)
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;

    fn input(name: &str, cents: i64, stock: u32) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            price: Money::from_cents(cents),
            stock_quantity: stock,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let catalog = CatalogService::new(InMemoryStore::new());
        let result = catalog.create_product(input("Broken", -100, 1)).await;
        assert!(matches!(result, Err(DomainError::InvalidPrice)));

        let product = catalog.create_product(input("Mat", 2500, 1)).await.unwrap();
        let update = ProductUpdate {
            original_price: Some(Money::from_cents(-1)),
            ..Default::default()
        };
        let result = catalog.update_product(product.id, update).await;
        assert!(matches!(result, Err(DomainError::InvalidPrice)));
    }

    #[tokio::test]
    async fn deactivated_products_leave_the_default_listing() {
        let catalog = CatalogService::new(InMemoryStore::new());
        let mat = catalog.create_product(input("Mat", 2500, 1)).await.unwrap();
        catalog.create_product(input("Rope", 900, 1)).await.unwrap();

        assert!(catalog.deactivate_product(mat.id).await.unwrap());
        assert!(!catalog.deactivate_product(ProductId::new(999)).await.unwrap());

        let listed = catalog.list_products(ProductFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Rope");

        // Still reachable by id
        assert!(!catalog.get_product(mat.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn set_stock_updates_in_stock_flag() {
        let catalog = CatalogService::new(InMemoryStore::new());
        let mat = catalog.create_product(input("Mat", 2500, 3)).await.unwrap();
        assert!(mat.in_stock);

        let emptied = catalog.set_stock(mat.id, 0).await.unwrap();
        assert_eq!(emptied.stock_quantity, 0);
        assert!(!emptied.in_stock);

        let missing = catalog.set_stock(ProductId::new(999), 1).await;
        assert!(matches!(missing, Err(DomainError::NotFound { entity: "Product", .. })));
    }

    #[tokio::test]
    async fn categories_and_brands() {
        let catalog = CatalogService::new(InMemoryStore::new());
        catalog.create_category("Strength", Some("Weights")).await.unwrap();
        catalog.create_brand("Acme").await.unwrap();

        assert_eq!(catalog.list_categories().await.unwrap()[0].name, "Strength");
        assert_eq!(catalog.list_brands().await.unwrap()[0].name, "Acme");
    }

    #[test]
    fn product_view_serializes_money_as_strings() {
        let now = Utc::now();
        let view = ProductView::from(Product {
            id: ProductId::new(1),
            name: "Mat".to_string(),
            description: None,
            sku: None,
            image: None,
            price: Money::from_cents(1000),
            original_price: None,
            stock_quantity: 5,
            weight: None,
            active: true,
            category_id: None,
            brand_id: None,
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["price"], "10.00");
        assert_eq!(json["stockQuantity"], 5);
        assert_eq!(json["inStock"], true);
    }
}
