//! HTTP API for the storefront.
//!
//! Serves the catalog, cart, checkout, orders, reviews and wishlists under
//! `/api`, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_state};

fn api_routes<S: Store + Clone + 'static>() -> Router<Arc<AppState<S>>> {
    use routes::{cart, orders, products, reviews, users, wishlist};

    Router::new()
        // Catalog
        .route(
            "/products",
            get(products::list::<S>).post(products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(products::get::<S>)
                .put(products::update::<S>)
                .delete(products::deactivate::<S>),
        )
        .route("/products/{id}/stock", put(products::set_stock::<S>))
        .route(
            "/categories",
            get(products::list_categories::<S>).post(products::create_category::<S>),
        )
        .route(
            "/brands",
            get(products::list_brands::<S>).post(products::create_brand::<S>),
        )
        // Cart
        .route("/cart", get(cart::get::<S>).delete(cart::clear::<S>))
        .route("/cart/items", post(cart::add_item::<S>))
        .route(
            "/cart/items/{item_id}",
            put(cart::update_item::<S>).delete(cart::remove_item::<S>),
        )
        // Orders
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/uuid/{uuid}", get(orders::get_by_uuid::<S>))
        .route("/orders/{id}/status", put(orders::update_status::<S>))
        .route("/orders/{id}/cancel", post(orders::cancel::<S>))
        // Reviews
        .route(
            "/products/{id}/reviews",
            get(reviews::list_for_product::<S>).post(reviews::create::<S>),
        )
        .route(
            "/reviews/{id}",
            get(reviews::get::<S>)
                .put(reviews::update::<S>)
                .delete(reviews::delete::<S>),
        )
        // Wishlist
        .route("/wishlist", get(wishlist::get::<S>).delete(wishlist::clear::<S>))
        .route(
            "/wishlist/{product_id}",
            post(wishlist::add::<S>).delete(wishlist::remove::<S>),
        )
        .route("/wishlist/{product_id}/check", get(wishlist::check::<S>))
        // Users
        .route("/users", post(users::register::<S>))
        .route("/users/me", get(users::me::<S>))
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api", api_routes::<S>())
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
