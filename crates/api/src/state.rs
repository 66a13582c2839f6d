//! Shared application state.

use std::sync::Arc;

use domain::{
    CartService, CatalogService, OrderService, ReviewService, StatusPolicy, UserLocks,
    UserService, WishlistService,
};
use store::Store;

/// Services accessible from all handlers, all backed by one store.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub reviews: ReviewService<S>,
    pub wishlists: WishlistService<S>,
    pub users: UserService<S>,
}

impl<S: Store + Clone> AppState<S> {
    /// Wires every service over `store`. Cart and checkout share one set of user locks.
    pub fn new(store: S, policy: StatusPolicy) -> Self {
        let locks = UserLocks::new();
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone(), locks.clone()),
            orders: OrderService::new(store.clone(), locks).with_policy(policy),
            reviews: ReviewService::new(store.clone()),
            wishlists: WishlistService::new(store.clone()),
            users: UserService::new(store),
        }
    }
}

/// Creates the application state for `store`.
pub fn create_state<S: Store + Clone>(store: S, policy: StatusPolicy) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, policy))
}
