//! Catalog endpoints: products, categories and brands.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{BrandId, CategoryId, ProductId};
use domain::{ProductInput, ProductUpdate, ProductView};
use serde::Deserialize;
use store::{Brand, Category, ProductFilter, Store};

use crate::error::ApiError;
use crate::extract::{Admin, ApiJson, ApiPath, ApiQuery, MaybeAuth};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BrandRequest {
    pub name: String,
}

/// GET /api/products
///
/// Inactive products are only listed for admins that ask for them.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    MaybeAuth(caller): MaybeAuth,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let is_admin = caller.is_some_and(|c| c.is_admin());
    let filter = ProductFilter {
        category_id: query.category_id,
        brand_id: query.brand_id,
        search: query.search.filter(|s| !s.trim().is_empty()),
        include_inactive: query.include_inactive && is_admin,
    };
    Ok(Json(state.catalog.list_products(filter).await?))
}

#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductView>, ApiError> {
    Ok(Json(state.catalog.get_product(id).await?))
}

#[tracing::instrument(skip(state, input))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<ProductView>), ApiError> {
    let product = state.catalog.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[tracing::instrument(skip(state, update))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> Result<Json<ProductView>, ApiError> {
    Ok(Json(state.catalog.update_product(id, update).await?))
}

/// DELETE /api/products/{id}: soft delete.
#[tracing::instrument(skip(state))]
pub async fn deactivate<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode, ApiError> {
    if state.catalog.deactivate_product(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Product not found".to_string()))
    }
}

/// PUT /api/products/{id}/stock
#[tracing::instrument(skip(state))]
pub async fn set_stock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(req): ApiJson<StockRequest>,
) -> Result<Json<ProductView>, ApiError> {
    Ok(Json(state.catalog.set_stock(id, req.quantity).await?))
}

pub async fn list_categories<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.catalog.list_categories().await?))
}

#[tracing::instrument(skip(state))]
pub async fn create_category<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state
        .catalog
        .create_category(&req.name, req.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_brands<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Brand>>, ApiError> {
    Ok(Json(state.catalog.list_brands().await?))
}

#[tracing::instrument(skip(state))]
pub async fn create_brand<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Admin(_admin): Admin,
    ApiJson(req): ApiJson<BrandRequest>,
) -> Result<(StatusCode, Json<Brand>), ApiError> {
    let brand = state.catalog.create_brand(&req.name).await?;
    Ok((StatusCode::CREATED, Json(brand)))
}
